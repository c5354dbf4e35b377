//! Toolchain installation against a mock download server.

use flate2::Compression;
use flate2::write::GzEncoder;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::{FileSystem, OsFs};
use toolset_core::runtime::{Os, Platform};
use toolset_tools_go::toolchain::{archive_name, discover_local};
use toolset_tools_go::{Toolchain, ToolchainSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn toolchain_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let body = b"#!/bin/sh\necho go1.23.10\n";
    let mut header = tar::Header::new_gnu();
    header.set_path("go/bin/go").unwrap();
    header.set_size(body.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append(&header, &body[..]).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn installs_latest_patch_of_partial_version() {
    let Ok(platform) = Platform::current() else {
        return;
    };
    if platform.os == Os::Windows {
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"version":"go1.24rc1","stable":false},
                {"version":"go1.23.10","stable":true},
                {"version":"go1.23.4","stable":true}]"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/dl/{}", archive_name("1.23.10", platform))))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(toolchain_tarball()))
        .expect(1)
        .mount(&server)
        .await;

    let source = ToolchainSource {
        index_url: format!("{}/dl/", server.uri()),
        download_base: format!("{}/dl", server.uri()),
    };
    let cache = tempfile::TempDir::new().unwrap();
    let fs = OsFs::new();
    let cancel = CancellationToken::new();

    let toolchain = source
        .install(&fs, cache.path(), "1.23", &cancel)
        .await
        .unwrap();
    assert_eq!(toolchain, Toolchain::local(cache.path(), "1.23.10"));
    assert!(fs.exists(&toolchain.go_bin));
    assert!(fs.exists(toolchain.build_cache.as_deref().unwrap()));

    // A second install is a no-op: the archive mock expects one download.
    source
        .install(&fs, cache.path(), "1.23.10", &cancel)
        .await
        .unwrap();

    let found = discover_local(&fs, cache.path()).unwrap();
    assert_eq!(found, vec![toolchain]);
    assert!(
        !std::fs::read_dir(cache.path())
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().starts_with(".rtgo-staging-")),
        "staging directory is cleaned up"
    );
}

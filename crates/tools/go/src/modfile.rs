//! Minimal `go.mod` reader used to read back versions `go get` resolved.

/// A `require` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    /// Module path.
    pub path: String,
    /// Resolved version.
    pub version: String,
}

/// Every `require` in `content`, from single-line directives and
/// `require ( … )` blocks. Comments are ignored.
#[must_use]
pub fn requires(content: &str) -> Vec<Require> {
    let mut out = Vec::new();
    let mut in_block = false;

    for raw in content.lines() {
        let line = raw.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(req) = parse_pair(line) {
                out.push(req);
            }
            continue;
        }

        let Some(rest) = line.strip_prefix("require") else {
            continue;
        };
        let rest = rest.trim();
        if rest == "(" {
            in_block = true;
        } else if let Some(req) = parse_pair(rest) {
            out.push(req);
        }
    }
    out
}

fn parse_pair(line: &str) -> Option<Require> {
    let mut fields = line.split_whitespace();
    let path = fields.next()?.trim_matches('"');
    let version = fields.next()?;
    Some(Require {
        path: path.to_string(),
        version: version.to_string(),
    })
}

/// Version of the required module that owns `package`: the longest declared
/// module path equal to, or a path prefix of, `package`.
#[must_use]
pub fn version_for<'a>(requires: &'a [Require], package: &str) -> Option<&'a str> {
    requires
        .iter()
        .filter(|r| {
            package == r.path
                || package
                    .strip_prefix(r.path.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .max_by_key(|r| r.path.len())
        .map(|r| r.version.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MOD: &str = r"module toolset-resolve

go 1.23.4

require corp.example.com/tools v1.2.0 // indirect

require (
	corp.example.com/tools/lint v0.4.1 // indirect
	golang.org/x/mod v0.22.0 // indirect
)
";

    #[test]
    fn test_requires() {
        let reqs = requires(GO_MOD);
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].path, "corp.example.com/tools");
        assert_eq!(reqs[1].version, "v0.4.1");
    }

    #[test]
    fn test_version_for_longest_prefix() {
        let reqs = requires(GO_MOD);
        assert_eq!(version_for(&reqs, "corp.example.com/tools/lint/cmd/lint"), Some("v0.4.1"));
        assert_eq!(version_for(&reqs, "corp.example.com/tools/gen"), Some("v1.2.0"));
        assert_eq!(version_for(&reqs, "corp.example.com/toolsx"), None);
        assert_eq!(version_for(&reqs, "golang.org/x/mod"), Some("v0.22.0"));
    }
}

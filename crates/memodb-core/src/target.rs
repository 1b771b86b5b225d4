use crate::errors::CacheError;
use std::fmt;
use std::path::PathBuf;

/// Where a connection points.
///
/// Parsed from SQLAlchemy-style SQLite URLs:
/// - `sqlite://`, `sqlite://:memory:`, `:memory:` — in-memory store
/// - `sqlite:///relative.db` — relative path
/// - `sqlite:////abs/path.db` — absolute path
/// - a bare path without a scheme
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectTarget {
    Memory,
    File(PathBuf),
}

impl ConnectTarget {
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CacheError::InvalidTarget("empty target".into()));
        }
        if raw == ":memory:" {
            return Ok(ConnectTarget::Memory);
        }

        let Some((scheme, rest)) = raw.split_once("://") else {
            return Ok(ConnectTarget::File(PathBuf::from(raw)));
        };
        if scheme != "sqlite" {
            return Err(CacheError::InvalidTarget(format!(
                "unsupported scheme {scheme:?} in {raw:?}"
            )));
        }
        match rest {
            "" | ":memory:" | "/:memory:" => Ok(ConnectTarget::Memory),
            _ => match rest.strip_prefix('/') {
                Some(path) if !path.is_empty() => Ok(ConnectTarget::File(PathBuf::from(path))),
                _ => Err(CacheError::InvalidTarget(format!(
                    "expected sqlite:///<path>, got {raw:?}"
                ))),
            },
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, ConnectTarget::Memory)
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Memory => write!(f, "sqlite://"),
            ConnectTarget::File(p) => write!(f, "sqlite:///{}", p.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_forms() {
        for raw in ["sqlite://", "sqlite://:memory:", ":memory:", "  sqlite://  "] {
            assert_eq!(ConnectTarget::parse(raw).unwrap(), ConnectTarget::Memory, "{raw}");
        }
    }

    #[test]
    fn file_forms() {
        assert_eq!(
            ConnectTarget::parse("sqlite:///cache.db").unwrap(),
            ConnectTarget::File("cache.db".into())
        );
        assert_eq!(
            ConnectTarget::parse("sqlite:////tmp/cache.db").unwrap(),
            ConnectTarget::File("/tmp/cache.db".into())
        );
        assert_eq!(
            ConnectTarget::parse("data/cache.sqlite").unwrap(),
            ConnectTarget::File("data/cache.sqlite".into())
        );
    }

    #[test]
    fn rejects_other_schemes_and_hosts() {
        assert!(matches!(
            ConnectTarget::parse("postgres://localhost/db"),
            Err(CacheError::InvalidTarget(_))
        ));
        assert!(matches!(
            ConnectTarget::parse("sqlite://host/db"),
            Err(CacheError::InvalidTarget(_))
        ));
        assert!(ConnectTarget::parse("").is_err());
    }

    #[test]
    fn display_round_trips() {
        for raw in ["sqlite://", "sqlite:///cache.db", "sqlite:////tmp/cache.db"] {
            let t = ConnectTarget::parse(raw).unwrap();
            assert_eq!(t.to_string(), raw);
            assert_eq!(ConnectTarget::parse(&t.to_string()).unwrap(), t);
        }
    }
}

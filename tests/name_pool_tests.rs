mod common;

use common::TestResult;
use std::collections::HashMap;
use stylus::names::{NamePool, NamePoolError};

#[test]
fn prefixes_share_a_fingerprint() -> TestResult {
    let pool = NamePool::new();
    let xsl = pool.allocate("xsl", "http://example/ns", "foo")?;
    let x = pool.allocate("x", "http://example/ns", "foo")?;
    assert_eq!(xsl.fingerprint(), x.fingerprint());
    assert_ne!(xsl, x);
    assert_eq!(pool.allocate("xsl", "http://example/ns", "foo")?, xsl);
    assert_eq!(pool.display_name(x)?, "x:foo");
    assert_eq!(pool.clark_name(xsl)?, "{http://example/ns}foo");
    Ok(())
}

#[test]
fn codes_do_not_resolve_in_other_pools() -> TestResult {
    let issuer = NamePool::new();
    let other = NamePool::new();
    let code = issuer.allocate("", "", "item")?;
    assert!(matches!(
        other.local_name(code),
        Err(NamePoolError::ForeignNameCode { .. })
    ));
    assert_eq!(&*issuer.local_name(code)?, "item");
    Ok(())
}

#[test]
fn lexical_names_resolve_through_bindings() -> TestResult {
    let pool = NamePool::new();
    let bindings = HashMap::from([("p".to_string(), "urn:p".to_string())]);
    let code = pool.allocate_lexical("p:name", &bindings, false)?;
    assert_eq!(&*pool.uri(code)?, "urn:p");
    assert_eq!(pool.fingerprint_for("urn:p", "name"), Some(code.fingerprint()));
    assert!(pool.fingerprint_for("urn:p", "other").is_none());
    assert!(pool.allocate_lexical("q:name", &bindings, false).is_err());
    Ok(())
}

#[test]
fn snapshots_round_trip_through_json() -> TestResult {
    let pool = NamePool::new();
    let code = pool.allocate("a", "urn:a", "thing")?;
    let json = serde_json::to_string(&pool.snapshot())?;
    let restored = NamePool::from_snapshot(&serde_json::from_str(&json)?)?;
    assert_ne!(restored.id(), pool.id());
    let again = restored.allocate("a", "urn:a", "thing")?;
    assert_eq!(again.bits(), code.bits());
    Ok(())
}

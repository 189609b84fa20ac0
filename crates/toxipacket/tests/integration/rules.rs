//! Rule lifecycle against a real kernel.

use toxipacket::Result;

use crate::common::TestNamespace;

#[tokio::test]
async fn test_add_show_remove() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("cycle")?;
    let ctl = ns.controller();

    let applied = ctl.add("10.0.0.5", Some(8080), 25).await?;
    assert_eq!(applied.interface.name(), "dummy0");

    let shown = ctl.show("10.0.0.5").await?;
    let qdiscs = shown.qdiscs();
    assert!(qdiscs.iter().any(|q| q.kind == "prio" && q.handle == "1:"));
    let netem = qdiscs
        .iter()
        .find(|q| q.handle == "2:")
        .expect("netem qdisc should exist");
    assert_eq!(netem.kind, "netem");
    assert_eq!(netem.loss.as_deref(), Some("25%"));

    let filters = ns.exec("tc", &["filter", "show", "dev", "dummy0"])?;
    assert!(filters.contains("flowid 2:1"), "{filters}");

    ctl.remove("10.0.0.5").await?;
    let shown = ctl.show("10.0.0.5").await?;
    assert!(
        shown
            .qdiscs()
            .iter()
            .all(|q| q.handle != "1:" && q.handle != "2:"),
        "{}",
        shown.output
    );

    Ok(())
}

#[tokio::test]
async fn test_second_add_is_rejected() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("twice")?;
    let ctl = ns.controller();

    ctl.add("10.0.0.5", None, 10).await?;
    let err = ctl.add("10.0.0.5", None, 10).await.unwrap_err();
    assert!(err.is_already_exists(), "{err}");

    ctl.remove("10.0.0.5").await?;
    Ok(())
}

#[tokio::test]
async fn test_remove_without_rule() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("empty")?;
    let err = ns.controller().remove("10.0.0.5").await.unwrap_err();
    assert!(err.is_no_rules(), "{err}");

    Ok(())
}

#[tokio::test]
async fn test_loopback_rule() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("lo")?;
    let ctl = ns.controller();

    let applied = ctl.add("localhost", None, 100).await?;
    assert_eq!(applied.interface.name(), "lo");
    ctl.remove("127.0.0.1").await?;

    Ok(())
}

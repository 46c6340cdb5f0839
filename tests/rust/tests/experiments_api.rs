use anyhow::Result;
use exp_core::logging::init_tracing;
use exp_core::{CellValue, Error, ExperimentStatus};
use experiments::{ExperimentsApi, MemoryRepoRegistry, MemoryRepository, QueryOptions, SaveOptions};
use std::collections::BTreeMap;

const REMOTE: &str = "git@example.com:team/classifier.git";

// Three commits on main, a tag on the first, experiments on the last
fn project() -> Result<(ExperimentsApi<MemoryRepoRegistry>, MemoryRepository)> {
    let repo = MemoryRepository::init("/work/classifier");
    repo.set_param("epochs", 10i64);
    for (i, acc) in [0.61, 0.74, 0.825].iter().enumerate() {
        repo.set_param("lr", 0.1 / (i as f64 + 1.0));
        repo.set_metric("acc", *acc);
        let rev = repo.commit(format!("train round {}", i));
        if i == 0 {
            repo.set_ref("v0.1", &rev)?;
        }
    }
    repo.set_param_deps(["lr"]);

    let registry = MemoryRepoRegistry::with_default(repo.clone());
    registry.register(REMOTE, repo.clone());
    Ok((ExperimentsApi::new(registry), repo))
}

#[tokio::test]
async fn test_save_then_query() -> Result<()> {
    init_tracing("experiments=debug");
    let (api, repo) = project()?;

    repo.set_param("lr", 0.5);
    repo.set_metric("acc", 0.9);
    let rev = api.save_experiment(SaveOptions::named("high-lr")).await?;

    let rows = api.query_experiments(QueryOptions::new()).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["rev"], CellValue::from("main"));
    assert_eq!(rows[1]["Experiment"], CellValue::from("high-lr"));
    assert_eq!(rows[1]["rev"], CellValue::from(&rev[..7]));
    assert_eq!(rows[1]["lr"], CellValue::Float(0.5));
    assert_eq!(rows[1]["acc"], CellValue::Float(0.9));
    assert_eq!(rows[1]["epochs"], CellValue::Float(10.0));
    Ok(())
}

#[tokio::test]
async fn test_save_collision() -> Result<()> {
    let (api, repo) = project()?;
    api.save_experiment(SaveOptions::named("sweep-1")).await?;

    let err = api
        .save_experiment(SaveOptions::named("sweep-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExperimentExists { ref name } if name == "sweep-1"));
    assert!(err.is_recoverable_by_caller());

    api.save_experiment(SaveOptions::named("sweep-1").force(true))
        .await?;
    assert_eq!(repo.experiment_names(), vec!["sweep-1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_history_window() -> Result<()> {
    let (api, _repo) = project()?;

    let rows = api.query_experiments(QueryOptions::new().num(2)).await?;
    assert_eq!(rows.len(), 2);

    let rows = api.query_experiments(QueryOptions::new().num(-1)).await?;
    let accs: Vec<_> = rows.iter().map(|r| r["acc"].clone()).collect();
    assert_eq!(
        accs,
        vec![
            CellValue::Float(0.825),
            CellValue::Float(0.74),
            CellValue::Float(0.61)
        ]
    );

    let rows = api
        .query_experiments(QueryOptions::new().revisions(["v0.1", "main"]))
        .await?;
    assert_eq!(rows[0]["rev"], CellValue::from("v0.1"));
    assert_eq!(rows[1]["rev"], CellValue::from("main"));

    let rows = api
        .query_experiments(QueryOptions::new().revision("v0.1").sha(true))
        .await?;
    assert_ne!(rows[0]["rev"], CellValue::from("v0.1"));
    Ok(())
}

#[tokio::test]
async fn test_filters_and_param_deps() -> Result<()> {
    let (api, repo) = project()?;
    api.save_experiment(SaveOptions::named("ok")).await?;
    repo.record_experiment("queued", ExperimentStatus::Queued, BTreeMap::new(), BTreeMap::new())?;
    repo.record_experiment("crashed", ExperimentStatus::Failed, BTreeMap::new(), BTreeMap::new())?;

    let rows = api.query_experiments(QueryOptions::new()).await?;
    assert_eq!(rows.len(), 4);
    // Queued runs have no metrics yet
    assert_eq!(rows[2]["acc"], CellValue::Null);

    let rows = api
        .query_experiments(QueryOptions::new().hide_queued(true).hide_failed(true))
        .await?;
    assert_eq!(rows.len(), 2);

    let rows = api
        .query_experiments(QueryOptions::new().param_deps(true))
        .await?;
    assert!(rows.iter().all(|r| !r.contains_key("epochs")));
    assert!(rows.iter().all(|r| r.contains_key("lr")));
    Ok(())
}

#[tokio::test]
async fn test_force_reload_bypasses_cache() -> Result<()> {
    let (api, repo) = project()?;
    api.save_experiment(SaveOptions::named("cached")).await?;

    api.query_experiments(QueryOptions::new()).await?;
    let after_first = repo.collected_rows();

    api.query_experiments(QueryOptions::new()).await?;
    assert_eq!(repo.collected_rows(), after_first);

    api.query_experiments(QueryOptions::new().force(true)).await?;
    assert_eq!(repo.collected_rows(), after_first + 2);
    Ok(())
}

#[tokio::test]
async fn test_remote_location() -> Result<()> {
    let (api, repo) = project()?;

    let rows = api
        .query_experiments(QueryOptions::new().repo(REMOTE).num(-1))
        .await?;
    assert_eq!(rows.len(), 3);
    assert_eq!(repo.open_handles(), 0);

    let err = api
        .query_experiments(QueryOptions::new().repo("https://example.com/unknown.git"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let err = api
        .query_experiments(QueryOptions::new().revision("deadbeefcafe"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RevisionNotFound { .. }));
    Ok(())
}

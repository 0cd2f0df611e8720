//! End-to-end runs over a scripted site and an in-memory store: a flaky
//! category on the first run, a vanished category on the second.

use recsync::config::SyncConfig;
use recsync::driver::ScriptedDriver;
use recsync::orchestrator::Orchestrator;
use recsync::store::MemoryStore;

const HUB: &str = "http://rec.test/hub";

const HUB_PAGE: &str = r#"
    <nav>
      <a href="/swimming">Swimming</a>
      <a href="/skating">Skating</a>
    </nav>
"#;

const HUB_PAGE_WITHOUT_SKATING: &str = r#"
    <nav>
      <a href="/swimming">Swimming</a>
    </nav>
"#;

// Three structured rows: two unique course codes, one duplicate.
const SWIMMING_PAGE: &str = r#"
    <h3>Swim Lessons</h3>
    <ul>
      <li class="program-item">Swim Kids 1 #10001 Mon 4:00 pm - 4:45 pm $80.00 Open at Ron Andrews Pool</li>
      <li class="program-item">Swim Kids 2 #10002 Wed 4:00 pm - 4:45 pm $80.00 Waitlist at Ron Andrews Pool</li>
    </ul>
    <h3>Aquatic Leadership</h3>
    <ul>
      <li class="program-item">Swim Kids 1 #10001 Mon 4:00 pm - 4:45 pm $80.00 Open at Ron Andrews Pool</li>
    </ul>
"#;

const SKATING_PAGE: &str = r#"
    <table>
      <tr><td>Learn to Skate #20001</td><td>$95.00</td><td>Open</td></tr>
    </table>
"#;

fn config(artifact_dir: &std::path::Path) -> SyncConfig {
    let mut config = SyncConfig::with_defaults("northshore", HUB);
    config.categories = Some(vec!["Swimming".to_string(), "Skating".to_string()]);
    config.artifact_dir = artifact_dir.to_path_buf();
    config
}

#[tokio::test]
async fn first_run_commits_three_activities_despite_a_flaky_category() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let driver = ScriptedDriver::new()
        .with_page(HUB, HUB_PAGE)
        .with_page("http://rec.test/swimming", SWIMMING_PAGE)
        .with_page("http://rec.test/skating", SKATING_PAGE)
        .fail_next_navigations("http://rec.test/skating", 1);
    let store = MemoryStore::new();

    let mut orchestrator = Orchestrator::new(driver, config(tmp.path()));
    let report = orchestrator.run(&store).await.expect("run");

    assert_eq!(report.total_activities, 3);
    assert_eq!(report.categories_processed, 2);
    assert_eq!(report.categories_failed, 0);
    assert_eq!(report.stats.created, 3);
    assert_eq!(report.stats.updated, 0);
    assert_eq!(report.stats.removed, 0);
    assert_eq!(report.stats.errors, 0);

    let activities = store.activities("northshore").await;
    assert_eq!(activities.len(), 3);
    assert!(activities.iter().all(|a| a.is_active));

    let artifact_path = report.artifact_path.expect("artifact written");
    let raw = std::fs::read_to_string(&artifact_path).expect("artifact readable");
    let artifact: serde_json::Value = serde_json::from_str(&raw).expect("artifact is json");
    assert_eq!(artifact["totalActivities"], 3);
    assert_eq!(artifact["categoriesProcessed"], 2);
    assert_eq!(artifact["provider"], "northshore");
    assert_eq!(artifact["activities"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn vanished_category_tombstones_its_activity_with_fields_unchanged() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = MemoryStore::new();

    let first_driver = ScriptedDriver::new()
        .with_page(HUB, HUB_PAGE)
        .with_page("http://rec.test/swimming", SWIMMING_PAGE)
        .with_page("http://rec.test/skating", SKATING_PAGE)
        .fail_next_navigations("http://rec.test/skating", 1);
    Orchestrator::new(first_driver, config(tmp.path()))
        .run(&store)
        .await
        .expect("first run");

    let before = store
        .get("northshore", "20001")
        .await
        .expect("skating activity persisted");
    assert!(before.is_active);

    // Skating has disappeared from the hub entirely.
    let second_driver = ScriptedDriver::new()
        .with_page(HUB, HUB_PAGE_WITHOUT_SKATING)
        .with_page("http://rec.test/swimming", SWIMMING_PAGE);
    let report = Orchestrator::new(second_driver, config(tmp.path()))
        .run(&store)
        .await
        .expect("second run");

    assert_eq!(report.total_activities, 2);
    assert_eq!(report.stats.created, 0);
    assert_eq!(report.stats.updated, 2);
    assert_eq!(report.stats.removed, 1);
    assert_eq!(report.stats.errors, 0);

    let after = store
        .get("northshore", "20001")
        .await
        .expect("tombstoned, not deleted");
    assert!(!after.is_active);
    assert_eq!(after.name, before.name);
    assert_eq!(after.cost, before.cost);
    assert_eq!(after.registration_url, before.registration_url);
    assert_eq!(after.last_seen_at, before.last_seen_at);

    let swimming = store
        .get("northshore", "10001")
        .await
        .expect("still active");
    assert!(swimming.is_active);
}

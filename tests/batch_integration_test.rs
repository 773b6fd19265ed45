use churn_batch::domain::ports::{ConfigProvider, Pipeline};
use churn_batch::{BatchEngine, BatchPipeline, ClientConfig, LocalStorage, PredictionClient, TomlConfig};
use httpmock::prelude::*;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const CUSTOMERS: &str = "gender,tenure,Contract
Female,5,Month-to-month
Male,34,One year
Female,2,Month-to-month
";

fn config_for(server: &MockServer, compression: bool) -> TomlConfig {
    let toml_content = format!(
        r#"
[service]
base_url = "{}"

[export]
output_path = "out"

[export.compression]
enabled = {}
"#,
        server.base_url(),
        compression
    );
    TomlConfig::from_toml_str(&toml_content).unwrap()
}

fn write_input(dir: &Path, contents: &str) {
    std::fs::write(dir.join("customers.csv"), contents).unwrap();
}

fn pipeline_for(
    dir: &TempDir,
    config: TomlConfig,
) -> BatchPipeline<LocalStorage, PredictionClient, TomlConfig> {
    let storage = LocalStorage::new(dir.path().to_string_lossy().into_owned());
    let client = PredictionClient::new(ClientConfig::from_provider(&config)).unwrap();
    BatchPipeline::new(storage, client, config, "customers.csv")
}

#[tokio::test]
async fn test_end_to_end_batch_with_one_failing_row() {
    let temp_dir = TempDir::new().unwrap();
    write_input(temp_dir.path(), CUSTOMERS);

    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict").body_contains("\"tenure\":5");
            then.status(200).json_body(serde_json::json!({
                "churn_probability": 0.82,
                "churn_prediction": 1,
                "risk_level": "High"
            }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict").body_contains("\"tenure\":34");
            then.status(500).body("model not loaded");
        })
        .await;
    let third = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict").body_contains("\"tenure\":2");
            then.status(200).json_body(serde_json::json!({
                "churn_probability": 0.45,
                "churn_prediction": 0,
                "risk_level": "Medium"
            }));
        })
        .await;

    let engine = BatchEngine::new(pipeline_for(&temp_dir, config_for(&server, true)));
    let report = engine.run().await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    third.assert_async().await;

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.succeeded + report.summary.failed, 3);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failures[0].index(), 1);
    assert!(report.failures[0].reason().contains("model not loaded"));
    assert_eq!(
        report.rows.iter().map(|row| row.index).collect::<Vec<_>>(),
        vec![0, 2]
    );

    let zip_path = temp_dir.path().join("out").join("churn_batch.zip");
    assert!(report.output_path.ends_with("churn_batch.zip"));
    assert!(zip_path.exists());

    let zip_data = std::fs::read(&zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    let file_names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(file_names.contains(&"churn_predictions.csv".to_string()));
    assert!(file_names.contains(&"summary.json".to_string()));
    assert!(file_names.contains(&"failures.json".to_string()));

    let mut csv_content = String::new();
    archive
        .by_name("churn_predictions.csv")
        .unwrap()
        .read_to_string(&mut csv_content)
        .unwrap();
    assert_eq!(
        csv_content,
        "churn_probability,churn_prediction,risk_level,gender,tenure,Contract\n\
         0.82,1,High,Female,5,Month-to-month\n\
         0.45,0,Medium,Female,2,Month-to-month\n"
    );

    let mut failures_content = String::new();
    archive
        .by_name("failures.json")
        .unwrap()
        .read_to_string(&mut failures_content)
        .unwrap();
    let failures: serde_json::Value = serde_json::from_str(&failures_content).unwrap();
    assert_eq!(failures[0]["kind"], "remote_invocation");
    assert_eq!(failures[0]["index"], 1);
    assert_eq!(failures[0]["status"], 500);
}

#[tokio::test]
async fn test_loose_files_when_compression_disabled() {
    let temp_dir = TempDir::new().unwrap();
    write_input(temp_dir.path(), "gender,tenure\nMale,12\n");

    let server = MockServer::start_async().await;
    let predict = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict");
            then.status(200).json_body(serde_json::json!({
                "churn_probability": 0.1,
                "churn_prediction": false,
                "risk_level": "Low"
            }));
        })
        .await;

    let config = config_for(&server, false);
    assert!(config.export_options().zip_filename.is_none());

    let engine = BatchEngine::new(pipeline_for(&temp_dir, config));
    let report = engine.run().await.unwrap();

    predict.assert_hits_async(1).await;
    assert_eq!(report.output_path, "out");

    let out_dir = temp_dir.path().join("out");
    let csv_content = std::fs::read_to_string(out_dir.join("churn_predictions.csv")).unwrap();
    assert_eq!(
        csv_content,
        "churn_probability,churn_prediction,risk_level,gender,tenure\n0.1,0,Low,Male,12\n"
    );
    assert!(out_dir.join("summary.json").exists());
    assert!(!out_dir.join("failures.json").exists());
    assert!(!out_dir.join("churn_batch.zip").exists());
}

#[tokio::test]
async fn test_header_only_input_makes_no_remote_calls() {
    let temp_dir = TempDir::new().unwrap();
    write_input(temp_dir.path(), "gender,tenure,Contract\n");

    let server = MockServer::start_async().await;
    let predict = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict");
            then.status(200);
        })
        .await;

    let engine = BatchEngine::new(pipeline_for(&temp_dir, config_for(&server, true)));
    let report = engine.run().await.unwrap();

    predict.assert_hits_async(0).await;
    assert_eq!(report.summary.total, 0);
    assert!(report.rows.is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_missing_input_file_aborts_before_scoring() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start_async().await;
    let predict = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict");
            then.status(200);
        })
        .await;

    let engine = BatchEngine::new(pipeline_for(&temp_dir, config_for(&server, true)));
    assert!(engine.run().await.is_err());
    predict.assert_hits_async(0).await;
    assert!(!temp_dir.path().join("out").exists());
}

#[tokio::test]
async fn test_unknown_column_is_reported_per_record() {
    let temp_dir = TempDir::new().unwrap();
    write_input(temp_dir.path(), "gender,favourite_colour\nMale,blue\n");

    let server = MockServer::start_async().await;
    let predict = server
        .mock_async(|when, then| {
            when.method(POST).path("/predict");
            then.status(200);
        })
        .await;

    let pipeline = pipeline_for(&temp_dir, config_for(&server, true));
    let records = pipeline.extract().await.unwrap();
    let outcome = pipeline.transform(records).await.unwrap();

    predict.assert_hits_async(0).await;
    assert_eq!(outcome.failed(), 1);
    assert!(outcome.failures[0].to_string().contains("favourite_colour"));
}

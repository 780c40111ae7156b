//! End-to-end replay tests against the mock client.
//!
//! Each test writes a dump to disk, replays it, and checks what reached the
//! execution handle and the progress sink.

use std::time::Duration;

use pretty_assertions::assert_eq;
use sqlreplay::config::ReplaySettings;
use sqlreplay::db::MockDatabaseClient;
use sqlreplay::dump::KeywordCase;
use sqlreplay::error::ReplayError;
use sqlreplay::replay::{OrderingPolicy, ProgressEvent, RecordingProgress, Replayer};

use super::common::{replay, without_preamble};

const MYSQLDUMP: &str = "\
-- MySQL dump 10.13  Distrib 8.0.36, for Linux (x86_64)
--
-- Host: localhost    Database: shop
-- ------------------------------------------------------
/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET NAMES utf8mb4 */;

--
-- Table structure for table `users`
--

DROP TABLE IF EXISTS `users`;
CREATE TABLE `users` (
  `id` int NOT NULL AUTO_INCREMENT,
  `email` varchar(255) NOT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

--
-- Dumping data for table `users`
--

LOCK TABLES `users` WRITE;
/*!40000 ALTER TABLE `users` DISABLE KEYS */;
INSERT INTO `users` VALUES (1,'a@example.com'),(2,'b@example.com');
INSERT INTO `users` VALUES (3,'c@example.com');
/*!40000 ALTER TABLE `users` ENABLE KEYS */;
UNLOCK TABLES;

DROP TABLE IF EXISTS `orders`;
CREATE TABLE `orders` (
  `id` int NOT NULL,
  `user_id` int NOT NULL,
  CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)
) ENGINE=InnoDB;

LOCK TABLES `orders` WRITE;
INSERT INTO `orders` VALUES (10,1);
INSERT INTO `orders` VALUES (11,2);
INSERT INTO `orders` VALUES (12,3);
UNLOCK TABLES;
";

#[tokio::test]
async fn test_mysqldump_replay() {
    let (report, client, progress) =
        replay(MYSQLDUMP, ReplaySettings::default(), MockDatabaseClient::new()).await;
    let stats = report.into_result().unwrap();

    assert_eq!(stats.dispatch.statements, 13);
    assert_eq!(stats.dispatch.enqueued, 5);
    assert_eq!(stats.dispatch.locks_suppressed, 2);
    assert_eq!(stats.dispatch.unlock_markers, 2);
    assert_eq!(stats.dispatch.tables, 2);
    assert_eq!(stats.dispatch.serial_succeeded, 4);
    assert_eq!(stats.pool.succeeded, 5);
    assert_eq!(stats.failed(), 0);

    let executed = client.executed();
    assert!(executed
        .iter()
        .all(|sql| sql.starts_with("SET FOREIGN_KEY_CHECKS=0;")));

    let serial: Vec<String> = without_preamble(&executed)
        .into_iter()
        .filter(|sql| !sql.starts_with("INSERT"))
        .collect();
    assert_eq!(
        serial,
        vec![
            "DROP TABLE IF EXISTS `users`;".to_string(),
            "CREATE TABLE `users` (  `id` int NOT NULL AUTO_INCREMENT,  `email` varchar(255) NOT NULL,  PRIMARY KEY (`id`)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;".to_string(),
            "DROP TABLE IF EXISTS `orders`;".to_string(),
            "CREATE TABLE `orders` (  `id` int NOT NULL,  `user_id` int NOT NULL,  CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)) ENGINE=InnoDB;".to_string(),
        ]
    );

    let boundaries: Vec<ProgressEvent> = progress
        .events()
        .into_iter()
        .filter(|e| matches!(e, ProgressEvent::TableBoundary { .. }))
        .collect();
    assert_eq!(
        boundaries,
        vec![
            ProgressEvent::TableBoundary {
                statements: 0,
                table: "users".to_string()
            },
            ProgressEvent::TableBoundary {
                statements: 2,
                table: "orders".to_string()
            },
        ]
    );
    assert_eq!(progress.count(&ProgressEvent::UnlockMarker), 2);
    assert_eq!(progress.count(&ProgressEvent::StatementDone), 5);
    assert_eq!(progress.count(&ProgressEvent::Draining), 1);
}

#[tokio::test]
async fn test_comment_then_insert() {
    let (report, client, _) = replay(
        "-- comment\nINSERT INTO t VALUES (1);\n",
        ReplaySettings::default(),
        MockDatabaseClient::new(),
    )
    .await;

    let stats = report.into_result().unwrap();
    assert_eq!(stats.dispatch.enqueued, 1);
    assert_eq!(
        without_preamble(&client.executed()),
        vec!["INSERT INTO t VALUES (1);"]
    );
}

#[tokio::test]
async fn test_lock_unlock_only() {
    let (report, client, progress) = replay(
        "LOCK TABLES t WRITE;\nUNLOCK TABLES;\n",
        ReplaySettings::default(),
        MockDatabaseClient::new(),
    )
    .await;

    let stats = report.into_result().unwrap();
    assert_eq!(stats.dispatch.enqueued, 0);
    assert_eq!(client.call_count(), 0);
    assert_eq!(
        progress.events(),
        vec![ProgressEvent::UnlockMarker, ProgressEvent::Draining]
    );
}

#[tokio::test]
async fn test_statement_split_across_three_lines() {
    let (_, client, _) = replay(
        "INSERT INTO t\nVALUES\n(1, 'x');\n",
        ReplaySettings::default(),
        MockDatabaseClient::new(),
    )
    .await;

    assert_eq!(
        without_preamble(&client.executed()),
        vec!["INSERT INTO tVALUES(1, 'x');"]
    );
}

#[tokio::test]
async fn test_single_worker_drains_thousand_inserts() {
    let dump: String = (0..1000)
        .map(|i| format!("INSERT INTO t VALUES ({i});\n"))
        .collect();
    let settings = ReplaySettings {
        workers: 1,
        ..Default::default()
    };

    let (report, client, progress) = replay(&dump, settings, MockDatabaseClient::new()).await;
    let stats = report.into_result().unwrap();

    assert_eq!(stats.dispatch.enqueued, 1000);
    assert_eq!(stats.pool.succeeded, 1000);
    assert_eq!(client.call_count(), 1000);
    assert_eq!(progress.count(&ProgressEvent::StatementDone), 1000);
}

#[tokio::test]
async fn test_failed_statements_are_reported_not_fatal() {
    let dump = "\
CREATE TABLE t (id int);
INSERT INTO t VALUES (1);
INSERT INTO missing VALUES (2);
INSERT INTO t VALUES (3);
CREATE TABLE missing_too (id int);
";
    let (report, client, progress) = replay(
        dump,
        ReplaySettings::default(),
        MockDatabaseClient::new().failing_on("missing"),
    )
    .await;

    let stats = report.into_result().unwrap();
    assert_eq!(stats.pool.succeeded, 2);
    assert_eq!(stats.pool.failed, 1);
    assert_eq!(stats.dispatch.serial_failed, 1);
    assert_eq!(stats.failed(), 2);
    assert_eq!(client.call_count(), 5);

    let failed_sql: Vec<String> = progress
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::ExecutionFailed { sql, .. } => Some(sql),
            _ => None,
        })
        .collect();
    assert_eq!(failed_sql.len(), 2);
    assert!(failed_sql.contains(&"INSERT INTO missing VALUES (2);".to_string()));
    assert!(failed_sql.contains(&"CREATE TABLE missing_too (id int);".to_string()));
}

#[tokio::test]
async fn test_unterminated_tail_is_not_executed() {
    let (report, client, _) = replay(
        "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2)\n",
        ReplaySettings::default(),
        MockDatabaseClient::new(),
    )
    .await;

    assert!(report.error.is_none());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_barrier_orders_alter_after_earlier_inserts() {
    let dump = "\
CREATE TABLE t (id int);
INSERT INTO t VALUES (1);
INSERT INTO t VALUES (2);
INSERT INTO t VALUES (3);
INSERT INTO t VALUES (4);
ALTER TABLE t ADD PRIMARY KEY (id);
INSERT INTO t VALUES (5);
";
    let settings = ReplaySettings {
        workers: 4,
        ordering: OrderingPolicy::Barrier,
        ..Default::default()
    };
    let client = MockDatabaseClient::new().with_delay(Duration::from_millis(15));

    let (report, client, _) = replay(dump, settings, client).await;
    report.into_result().unwrap();

    let executed = without_preamble(&client.executed());
    let alter = executed
        .iter()
        .position(|sql| sql.starts_with("ALTER"))
        .unwrap();
    for i in 1..=4 {
        let insert = executed
            .iter()
            .position(|sql| sql == &format!("INSERT INTO t VALUES ({i});"))
            .unwrap();
        assert!(insert < alter, "insert {i} ran after ALTER");
    }
}

#[tokio::test]
async fn test_ignore_case_routes_lowercase_inserts_to_pool() {
    let settings = ReplaySettings {
        keyword_case: KeywordCase::Ignore,
        ..Default::default()
    };
    let (report, _, _) = replay(
        "insert into t values (1);\nlock tables t write;\n",
        settings,
        MockDatabaseClient::new(),
    )
    .await;

    let stats = report.into_result().unwrap();
    assert_eq!(stats.dispatch.enqueued, 1);
    assert_eq!(stats.dispatch.locks_suppressed, 1);
}

#[tokio::test]
async fn test_exact_case_runs_lowercase_inserts_serially() {
    let (report, _, _) = replay(
        "insert into t values (1);\n",
        ReplaySettings::default(),
        MockDatabaseClient::new(),
    )
    .await;

    let stats = report.into_result().unwrap();
    assert_eq!(stats.dispatch.enqueued, 0);
    assert_eq!(stats.dispatch.serial_succeeded, 1);
}

#[tokio::test]
async fn test_empty_preamble_submits_bare_statements() {
    let settings = ReplaySettings {
        preamble: String::new(),
        ..Default::default()
    };
    let (_, client, _) = replay(
        "CREATE TABLE t (id int);\n",
        settings,
        MockDatabaseClient::new(),
    )
    .await;

    assert_eq!(client.executed(), vec!["CREATE TABLE t (id int);"]);
}

#[tokio::test]
async fn test_oversized_statement_is_config_error() {
    let settings = ReplaySettings {
        buffer_size: 64,
        ..Default::default()
    };
    let dump = format!("INSERT INTO t VALUES ('{}');\n", "x".repeat(100));

    let (report, client, _) = replay(&dump, settings, MockDatabaseClient::new()).await;

    assert!(matches!(report.error, Some(ReplayError::Config(_))));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_missing_dump_file_is_stream_error() {
    let replayer = Replayer::new(
        ReplaySettings::default(),
        std::sync::Arc::new(MockDatabaseClient::new()),
        std::sync::Arc::new(RecordingProgress::new()),
    )
    .unwrap();

    let err = replayer
        .run_file(std::path::Path::new("/nonexistent/dump.sql"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReplayError::Stream(_)));
}

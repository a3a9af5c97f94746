//! Integration tests for the mpsync CLI
//!
//! These tests exercise the commands end-to-end with assert_cmd against
//! fixture SQLite stores built per test, using the versioned query
//! files shipped in queries/.

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn queries_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("queries")
}

/// A temp workspace with an analytics store and a record store.
struct Fixture {
    tmp: TempDir,
    analytics: PathBuf,
    records: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let analytics = tmp.path().join("analytics.db");
        let records = tmp.path().join("records.db");

        let conn = Connection::open(&analytics).unwrap();
        conn.execute_batch(
            "CREATE TABLE account_status_corrections (salesforce_id TEXT, correct_status TEXT);
             CREATE TABLE partner_doc_counts (salesforce_id TEXT, mb_wos REAL, mb_quotes REAL);
             CREATE TABLE partner_documents (doc_id INTEGER, mp_id TEXT, tipo TEXT, doc_date TEXT);
             CREATE TABLE item_quotations (
                 item_quote_id INTEGER, rfq_id INTEGER, item_id INTEGER,
                 mp_id TEXT, mp_name TEXT, unit_price REAL,
                 rfq_name TEXT, customer_name TEXT, main_process TEXT, pod TEXT);",
        )
        .unwrap();

        let conn = Connection::open(&records).unwrap();
        conn.execute_batch(
            "CREATE TABLE Account (
                 Id TEXT PRIMARY KEY, Name TEXT, Account_Status__c TEXT,
                 main_process__c TEXT, Completed_Work_Orders__c REAL,
                 Number_of_RFQs_MP_has_quoted__c REAL, NDA_status__c TEXT,
                 truora_test__c TEXT, syntage_test__c TEXT, last_wo_date__c TEXT,
                 global_score__c REAL, supply_chain_category__c TEXT,
                 machining_capability__c INTEGER DEFAULT 0,
                 logistics_capability__c INTEGER DEFAULT 0,
                 formation_capability__c INTEGER DEFAULT 0,
                 tooling_capability__c INTEGER DEFAULT 0,
                 heavy_fab_capability__c INTEGER DEFAULT 0,
                 laboratory_capability__c INTEGER DEFAULT 0,
                 finishing_capability__c INTEGER DEFAULT 0,
                 joining_welding_capability__c INTEGER DEFAULT 0,
                 light_fab_capability__c INTEGER DEFAULT 0,
                 other_capability__c INTEGER DEFAULT 0);
             CREATE TABLE State_Code__c (States__c TEXT, state_code__c TEXT, Region__c TEXT);
             CREATE TABLE Address__c (Account__c TEXT, location__StateCode__s TEXT);
             CREATE TABLE Product2 (
                 Id TEXT, Name TEXT, Family TEXT, rm_material__c TEXT,
                 manufacturing_product_category__c TEXT);
             CREATE TABLE MP_Product__c (product__c TEXT, account__c TEXT);
             CREATE TABLE Contact (
                 AccountId TEXT, LastName TEXT, FirstName TEXT, Phone TEXT,
                 MobilePhone TEXT, Email TEXT, Title TEXT);",
        )
        .unwrap();

        Self {
            tmp,
            analytics,
            records,
        }
    }

    fn exec(&self, db: &Path, sql: &str) {
        Connection::open(db).unwrap().execute_batch(sql).unwrap();
    }

    /// A command wired to the fixture stores and the shipped queries.
    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("mpsync").unwrap();
        cmd.current_dir(self.tmp.path())
            .env("MPSYNC_ANALYTICS_DB", &self.analytics)
            .env("MPSYNC_RECORDS_DB", &self.records)
            .args(args)
            .arg("--queries-dir")
            .arg(queries_dir());
        cmd
    }

    fn record_text(&self, id: &str, column: &str) -> Option<String> {
        let conn = Connection::open(&self.records).unwrap();
        conn.query_row(
            &format!("SELECT \"{column}\" FROM Account WHERE Id = ?1"),
            [id],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn record_f64(&self, id: &str, column: &str) -> Option<f64> {
        let conn = Connection::open(&self.records).unwrap();
        conn.query_row(
            &format!("SELECT \"{column}\" FROM Account WHERE Id = ?1"),
            [id],
            |row| row.get(0),
        )
        .unwrap()
    }

    /// A state, a manufacturing partner at that state, and a
    /// raw-materials supplier with one product listing.
    fn seed_finder(&self) {
        self.exec(
            &self.records,
            "INSERT INTO State_Code__c VALUES ('Nuevo León', 'NLE', 'Norte');
             INSERT INTO State_Code__c VALUES ('Jalisco', 'JAL', 'Occidente');
             INSERT INTO Account (Id, Name, supply_chain_category__c, main_process__c,
                                  Account_Status__c, Completed_Work_Orders__c,
                                  machining_capability__c)
                 VALUES ('m1', 'Taller Uno', 'Manufacturing', 'Machining',
                         'Active MP', 12, 1);
             INSERT INTO Account (Id, Name, supply_chain_category__c, main_process__c)
                 VALUES ('m2', 'Taller Dos', 'Manufacturing', 'Machining');
             INSERT INTO Account (Id, Name, supply_chain_category__c, Account_Status__c,
                                  global_score__c)
                 VALUES ('r1', 'Aceros MX', 'Raw Materials', 'Active MP', 4.5);
             INSERT INTO Address__c VALUES ('m1', 'NLE');
             INSERT INTO Address__c VALUES ('m2', 'JAL');
             INSERT INTO Address__c VALUES ('r1', 'NLE');
             INSERT INTO Product2 (Id, Name, Family) VALUES ('p1', 'Steel Sheet', 'Raw Materials');
             INSERT INTO MP_Product__c VALUES ('p1', 'r1');",
        );
    }
}

#[test]
fn update_status_writes_corrections() {
    let fx = Fixture::new();
    fx.exec(
        &fx.records,
        "INSERT INTO Account (Id, Name, Account_Status__c)
             VALUES ('m1', 'Taller Uno', 'Active MP');",
    );
    fx.exec(
        &fx.analytics,
        "INSERT INTO account_status_corrections VALUES ('m1', 'Inactive MP');",
    );

    fx.cmd(&["update", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: 1 write(s), 1 succeeded"));
    assert_eq!(
        fx.record_text("m1", "Account_Status__c").as_deref(),
        Some("Inactive MP")
    );
}

#[test]
fn update_status_reports_unknown_record_as_failure() {
    let fx = Fixture::new();
    fx.exec(
        &fx.analytics,
        "INSERT INTO account_status_corrections VALUES ('ghost', 'Inactive MP');",
    );

    fx.cmd(&["update", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 failed"))
        .stdout(predicate::str::contains("ghost"));
}

#[test]
fn update_wos_quotes_only_writes_diffs() {
    let fx = Fixture::new();
    fx.exec(
        &fx.records,
        "INSERT INTO Account (Id, Name, Completed_Work_Orders__c, Number_of_RFQs_MP_has_quoted__c)
             VALUES ('m1', 'Taller Uno', 5, NULL);",
    );
    // wos already agrees; quotes goes from null to 3
    fx.exec(
        &fx.analytics,
        "INSERT INTO partner_doc_counts VALUES ('m1', 5, 3);",
    );

    fx.cmd(&["update", "wos-quotes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wos-quotes: 1 write(s), 1 succeeded"));
    assert_eq!(
        fx.record_f64("m1", "Number_of_RFQs_MP_has_quoted__c"),
        Some(3.0)
    );
    assert_eq!(fx.record_f64("m1", "Completed_Work_Orders__c"), Some(5.0));
}

#[test]
fn update_wos_quotes_second_run_writes_nothing() {
    let fx = Fixture::new();
    fx.exec(
        &fx.records,
        "INSERT INTO Account (Id, Name, Completed_Work_Orders__c, Number_of_RFQs_MP_has_quoted__c)
             VALUES ('m1', 'Taller Uno', 5, NULL);",
    );
    fx.exec(
        &fx.analytics,
        "INSERT INTO partner_doc_counts VALUES ('m1', 7, 3);",
    );

    fx.cmd(&["update", "wos-quotes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wos-quotes: 2 write(s), 2 succeeded"));

    // Nothing changed in between, so the rerun finds nothing to write.
    fx.cmd(&["update", "wos-quotes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wos-quotes: 0 write(s), 0 succeeded"));
}

#[test]
fn update_status_inline_requires_a_query() {
    let fx = Fixture::new();

    fx.cmd(&["update", "status", "--inline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--query"));
}

#[test]
fn find_mps_filters_by_capability_and_state() {
    let fx = Fixture::new();
    fx.seed_finder();

    fx.cmd(&["find", "mps", "-p", "machining", "-s", "Nuevo León"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Taller Uno"))
        .stdout(predicate::str::contains("Taller Dos").not());
}

#[test]
fn find_mps_rejects_unknown_state() {
    let fx = Fixture::new();
    fx.seed_finder();

    fx.cmd(&["find", "mps", "-p", "machining", "-s", "Atlantis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Atlantis"));
}

#[test]
fn find_rm_matches_products_and_warns_about_missing_ones() {
    let fx = Fixture::new();
    fx.seed_finder();

    fx.cmd(&[
        "find",
        "rm",
        "-p",
        "Steel Sheet",
        "-p",
        "Copper Rod",
        "-s",
        "Nuevo León",
        "--no-log",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Aceros MX"))
    .stderr(predicate::str::contains("Copper Rod"));
}

#[test]
fn find_rm_records_the_search_in_the_audit_log() {
    let fx = Fixture::new();
    fx.seed_finder();

    let template = fx.tmp.path().join("template.csv");
    fs::write(
        &template,
        "user,date,state,products,mps,region,quotes,wos,status,type,score\n",
    )
    .unwrap();
    let log = fx.tmp.path().join("searches.db");
    let config = fx.tmp.path().join("config.yaml");
    fs::write(
        &config,
        format!(
            "user: ops@example.com\nsearch_log: {}\nsearch_log_template: {}\n",
            log.display(),
            template.display()
        ),
    )
    .unwrap();

    let mut cmd = fx.cmd(&["find", "rm", "-p", "Steel Sheet", "-s", "Nuevo León"]);
    cmd.arg("--config").arg(&config);
    cmd.assert().success();

    let conn = Connection::open(&log).unwrap();
    let (user, products, mps): (String, String, String) = conn
        .query_row(
            "SELECT user, products, mps FROM search_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(user, "ops@example.com");
    assert_eq!(products, "Steel Sheet");
    assert_eq!(mps, "Aceros MX");
}

#[test]
fn find_contacts_drops_unreachable_rows() {
    let fx = Fixture::new();
    fx.seed_finder();
    fx.exec(
        &fx.records,
        "INSERT INTO Contact (AccountId, FirstName, LastName, Email)
             VALUES ('r1', 'Ana', 'Ruiz', 'ana@example.com');
         INSERT INTO Contact (AccountId, FirstName, LastName)
             VALUES ('r1', 'Beto', 'Lara');",
    );

    fx.cmd(&["find", "contacts", "Aceros MX"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana"))
        .stdout(predicate::str::contains("Beto").not());
}

fn seed_rfq(fx: &Fixture) {
    fx.exec(
        &fx.analytics,
        "INSERT INTO item_quotations VALUES
             (1, 101, 1, 'm1', 'Taller Uno', 10.5, 'RFQ Brackets', 'Acme', 'Machining', 'MTY'),
             (2, 101, 1, 'm2', 'Taller Dos', 0, 'RFQ Brackets', 'Acme', 'Machining', 'MTY'),
             (3, 101, 2, 'm1', 'Taller Uno', 0, 'RFQ Brackets', 'Acme', 'Machining', 'MTY'),
             (4, 101, 2, 'm2', 'Taller Dos', 0, 'RFQ Brackets', 'Acme', 'Machining', 'MTY');",
    );
    fx.exec(
        &fx.records,
        "INSERT INTO Product2 (Id, Name, manufacturing_product_category__c)
             VALUES ('mp1', 'Bolts', 'Fasteners');",
    );
}

#[test]
fn rfq_info_shows_the_header() {
    let fx = Fixture::new();
    seed_rfq(&fx);

    fx.cmd(&["rfq", "info", "101"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RFQ Brackets"))
        .stdout(predicate::str::contains("Acme"));
}

#[test]
fn rfq_items_drops_unquoted_rows() {
    let fx = Fixture::new();
    seed_rfq(&fx);

    // item 2 got only zero prices and disappears from the matrix
    fx.cmd(&["rfq", "items", "101", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.50"))
        .stdout(predicate::str::contains("\n2,").not());
}

#[test]
fn rfq_info_fails_for_unknown_rfq() {
    let fx = Fixture::new();
    seed_rfq(&fx);

    fx.cmd(&["rfq", "info", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("999"));
}

#[test]
fn rfq_categories_lists_the_vocabulary() {
    let fx = Fixture::new();
    seed_rfq(&fx);

    fx.cmd(&["rfq", "categories"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fasteners"));
    fx.cmd(&["rfq", "categories", "--category", "Fasteners"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bolts"));
}

#[test]
fn rfq_classify_appends_quoted_items_to_the_sheet() {
    let fx = Fixture::new();
    seed_rfq(&fx);
    let sheet = fx.tmp.path().join("pricing.csv");

    let mut cmd = fx.cmd(&["rfq", "classify", "101", "1=Fasteners/Bolts"]);
    cmd.arg("--sink").arg(&sheet);
    // only the m1 quote carries a price; the zero quote is dropped
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 entrie(s) added"));

    let contents = fs::read_to_string(&sheet).unwrap();
    assert!(contents.contains("Taller Uno"));
    assert!(contents.contains("Fasteners"));
    assert!(!contents.contains("Taller Dos"));
}

#[test]
fn completions_generate_for_bash() {
    Command::cargo_bin("mpsync")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mpsync"));
}

#[test]
fn missing_database_config_is_a_clear_error() {
    let tmp = TempDir::new().unwrap();
    Command::cargo_bin("mpsync")
        .unwrap()
        .current_dir(tmp.path())
        .env_remove("MPSYNC_ANALYTICS_DB")
        .env_remove("MPSYNC_RECORDS_DB")
        .args(["update", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("analytics_db"));
}

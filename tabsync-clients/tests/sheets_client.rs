//! SheetsClient against a local mock of the Sheets v4 values API.

use mockito::{Matcher, Server};
use serde_json::json;

use tabsync_clients::SheetsClient;
use tabsync_core::config::SheetsConfig;
use tabsync_core::{RowNumber, SheetStore};

const HEADER_PATH: &str = r"^/v4/spreadsheets/abc/values/.+1(%3A|:)1$";
const TAB_PATH: &str = r"^/v4/spreadsheets/abc/values/(%27|')Sheet1(%27|')$";

fn client(server: &Server) -> SheetsClient {
    SheetsClient::new(&SheetsConfig {
        spreadsheet_id: "abc".into(),
        access_token: "token".into(),
        sheet_name: "Sheet1".into(),
        api_base: server.url(),
    })
}

#[test]
fn header_is_the_first_row() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", Matcher::Regex(HEADER_PATH.into()))
        .match_header("authorization", "Bearer token")
        .with_status(200)
        .with_body(json!({"values": [["Name", "Status", "Notion Page ID"]]}).to_string())
        .create();

    let header = client(&server).get_header().expect("header");

    mock.assert();
    assert_eq!(header, ["Name", "Status", "Notion Page ID"]);
}

#[test]
fn empty_sheet_has_empty_header() {
    let mut server = Server::new();
    server
        .mock("GET", Matcher::Regex(HEADER_PATH.into()))
        .with_status(200)
        .with_body(r#"{"range":"Sheet1!A1:Z1","majorDimension":"ROWS"}"#)
        .create();

    assert!(client(&server).get_header().expect("header").is_empty());
}

#[test]
fn rows_are_numbered_from_two_and_keep_gaps() {
    let mut server = Server::new();
    server
        .mock("GET", Matcher::Regex(TAB_PATH.into()))
        .with_status(200)
        .with_body(
            json!({"values": [
                ["Name", "Done"],
                ["Alpha", true],
                [],
                ["Gamma"],
            ]})
            .to_string(),
        )
        .create();

    let rows = client(&server).get_all_rows().expect("rows");

    let numbers: Vec<usize> = rows.iter().map(|r| r.number.0).collect();
    assert_eq!(numbers, [2, 3, 4]);
    assert_eq!(rows[0].cells, ["Alpha", "TRUE"]);
    assert!(rows[1].cells.is_empty());
    assert_eq!(rows[2].cell(1), "");
}

#[test]
fn append_returns_row_from_updated_range() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", Matcher::Regex(r":append$".into()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("valueInputOption".into(), "RAW".into()),
            Matcher::UrlEncoded("insertDataOption".into(), "INSERT_ROWS".into()),
        ]))
        .match_body(Matcher::PartialJson(json!({"values": [["Alpha", "p1"]]})))
        .with_status(200)
        .with_body(
            json!({
                "spreadsheetId": "abc",
                "updates": {"updatedRange": "Sheet1!A9:B9", "updatedRows": 1}
            })
            .to_string(),
        )
        .create();

    let row = client(&server)
        .append_row(&["Alpha".to_string(), "p1".to_string()])
        .expect("append");

    mock.assert();
    assert_eq!(row, RowNumber(9));
}

#[test]
fn update_puts_raw_values_at_row() {
    let mut server = Server::new();
    let mock = server
        .mock("PUT", Matcher::Regex(r"A4$".into()))
        .match_query(Matcher::UrlEncoded("valueInputOption".into(), "RAW".into()))
        .match_body(Matcher::PartialJson(json!({"values": [["Alpha", "p1"]]})))
        .with_status(200)
        .with_body(r#"{"updatedRows":1}"#)
        .create();

    client(&server)
        .update_row(RowNumber(4), &["Alpha".to_string(), "p1".to_string()])
        .expect("update");

    mock.assert();
}

#[test]
fn server_errors_are_transient() {
    let mut server = Server::new();
    server
        .mock("GET", Matcher::Regex(HEADER_PATH.into()))
        .with_status(503)
        .with_body(r#"{"error":{"code":503,"message":"The service is currently unavailable."}}"#)
        .create();

    let err = client(&server).get_header().expect_err("503");

    assert!(err.is_transient());
    assert!(err.to_string().contains("currently unavailable"), "{err}");
}

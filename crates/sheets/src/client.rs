use std::{path::Path, sync::Arc};

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::{Value, json},
    sheetbot_common::{FieldMap, FieldValue},
    sheetbot_config::SheetsConfig,
    sheetbot_dispatch::TabularStore,
    tracing::{debug, info},
};

use crate::{
    auth::{AccessTokenSource, ServiceAccountAuth},
    error::{Error, Result, check_status},
};

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
}

/// Appends rows to one sheet of one spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    auth: Arc<dyn AccessTokenSource>,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    header_range: String,
}

impl SheetsClient {
    pub fn new(
        http: reqwest::Client,
        auth: Arc<dyn AccessTokenSource>,
        config: &SheetsConfig,
    ) -> Self {
        Self {
            http,
            auth,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            header_range: config.header_range.clone(),
        }
    }

    /// Build a client authenticated with the service-account key at
    /// `config.credentials_path`.
    pub fn from_config(config: &SheetsConfig) -> Result<Self> {
        let http = reqwest::Client::new();
        let auth = ServiceAccountAuth::from_file(Path::new(&config.credentials_path), http.clone())?;
        info!(
            client_email = auth.client_email(),
            spreadsheet = %config.spreadsheet_id,
            sheet = %config.sheet_name,
            "sheets client ready"
        );
        Ok(Self::new(http, Arc::new(auth), config))
    }

    /// `cells` qualified with the sheet name, quoted when the name needs it.
    fn range(&self, cells: &str) -> String {
        let plain = self
            .sheet_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            format!("{}!{cells}", self.sheet_name)
        } else {
            format!("'{}'!{cells}", self.sheet_name.replace('\'', "''"))
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .get(self.values_url(range))
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        let body: ValueRange = check_status(resp).await?.json().await?;
        Ok(body.values)
    }

    /// The header row, in column order.
    pub async fn headers(&self) -> Result<Vec<String>> {
        let rows = self.get_values(&self.range(&self.header_range)).await?;
        let headers = rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|cell| match cell {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        Ok(headers)
    }

    /// Append `row` after the sheet's data table, ordered by the header row.
    ///
    /// Uses the `:append` endpoint with `INSERT_ROWS`, so the server picks
    /// the target row and concurrent appends never land on the same one.
    /// Returns the A1 range the row was written to.
    pub async fn append_row(&self, row: &FieldMap) -> Result<String> {
        if row.is_empty() {
            return Err(Error::message("refusing to write an empty row"));
        }

        let headers = self.headers().await?;
        if headers.is_empty() {
            return Err(Error::message("sheet has no header row"));
        }
        let cells = row_for_headers(&headers, row);
        let range = self.range(&self.header_range);

        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .post(format!("{}:append", self.values_url(&range)))
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token.expose_secret())
            .json(&json!({ "values": [cells] }))
            .send()
            .await?;
        let body: AppendResponse = check_status(resp).await?.json().await?;
        let written = body
            .updates
            .and_then(|u| u.updated_range)
            .unwrap_or_default();

        debug!(
            sheet = %self.sheet_name,
            range = %written,
            columns = headers.len(),
            "row appended"
        );
        Ok(written)
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn columns(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.headers().await?)
    }

    async fn write_row(&self, row: &FieldMap) -> anyhow::Result<()> {
        self.append_row(row).await?;
        Ok(())
    }
}

/// Cell values for `row` in header order. Keys without a header are dropped
/// and headers without a key become empty strings.
pub fn row_for_headers(headers: &[String], row: &FieldMap) -> Vec<Value> {
    headers
        .iter()
        .map(|header| match row.get(header) {
            Some(FieldValue::Integer(n)) => json!(n),
            Some(FieldValue::Float(f)) => json!(f),
            Some(FieldValue::Text(s)) => json!(s),
            None => json!(""),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::auth::StaticToken, mockito::Matcher, rstest::rstest};

    fn config(base_url: &str, sheet_name: &str) -> SheetsConfig {
        SheetsConfig {
            spreadsheet_id: "sheet-id".into(),
            sheet_name: sheet_name.into(),
            api_base_url: base_url.into(),
            ..Default::default()
        }
    }

    fn client(base_url: &str) -> SheetsClient {
        SheetsClient::new(
            reqwest::Client::new(),
            Arc::new(StaticToken::new("test-token")),
            &config(base_url, "Sales"),
        )
    }

    fn laptop() -> FieldMap {
        [
            ("product", FieldValue::Text("Laptop".into())),
            ("quantity", FieldValue::Integer(5)),
            ("price", FieldValue::Float(1200.5)),
            ("ignored", FieldValue::Text("x".into())),
        ]
        .into_iter()
        .collect()
    }

    fn path(range: &str) -> Matcher {
        Matcher::Regex(format!("^/v4/spreadsheets/sheet-id/values/{range}"))
    }

    #[test]
    fn row_follows_header_order() {
        let headers: Vec<String> = ["price", "notes", "product", "quantity"]
            .into_iter()
            .map(String::from)
            .collect();
        let cells = row_for_headers(&headers, &laptop());
        assert_eq!(cells, vec![json!(1200.5), json!(""), json!("Laptop"), json!(5)]);
    }

    #[test]
    fn no_headers_means_no_cells() {
        assert!(row_for_headers(&[], &laptop()).is_empty());
    }

    #[rstest]
    #[case("Sales", "A:A", "Sales!A:A")]
    #[case("Q1 Sales", "A1:Z1", "'Q1 Sales'!A1:Z1")]
    #[case("Bob's", "A3", "'Bob''s'!A3")]
    fn qualifies_ranges(#[case] sheet: &str, #[case] cells: &str, #[case] expected: &str) {
        let client = SheetsClient::new(
            reqwest::Client::new(),
            Arc::new(StaticToken::new("t")),
            &config("http://localhost", sheet),
        );
        assert_eq!(client.range(cells), expected);
    }

    #[tokio::test]
    async fn reads_headers_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", path("Sales(!|%21)A1(:|%3A)Z1"))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"range":"Sales!A1:Z1","values":[["product","quantity",7]]}"#)
            .create_async()
            .await;

        let headers = client(&server.url()).headers().await.unwrap();
        assert_eq!(headers, vec!["product", "quantity", "7"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_sheet_has_no_headers() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"range":"Sales!A1:Z1"}"#)
            .create_async()
            .await;

        assert!(client(&server.url()).headers().await.unwrap().is_empty());
    }

    async fn header_mock(server: &mut mockito::ServerGuard, body: &str) -> mockito::Mock {
        server
            .mock("GET", path("Sales(!|%21)A1(:|%3A)Z1"))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn appends_through_the_append_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let _headers = header_mock(&mut server, r#"{"values":[["product","quantity","price"]]}"#).await;
        let column_a = server
            .mock("GET", path("Sales(!|%21)A(:|%3A)A"))
            .expect(0)
            .create_async()
            .await;
        let write = server
            .mock("POST", path("Sales(!|%21)A1(:|%3A)Z1:append"))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("valueInputOption".into(), "USER_ENTERED".into()),
                Matcher::UrlEncoded("insertDataOption".into(), "INSERT_ROWS".into()),
            ]))
            .match_body(Matcher::Json(json!({
                "values": [["Laptop", 5, 1200.5]]
            })))
            .with_status(200)
            .with_body(r#"{"updates":{"updatedRange":"Sales!A4:C4","updatedRows":1}}"#)
            .expect(1)
            .create_async()
            .await;

        let written = client(&server.url()).append_row(&laptop()).await.unwrap();
        assert_eq!(written, "Sales!A4:C4");
        write.assert_async().await;
        column_a.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_appends_each_reach_the_server() {
        let mut server = mockito::Server::new_async().await;
        let _headers = header_mock(&mut server, r#"{"values":[["product"]]}"#).await;
        let write = server
            .mock("POST", path("Sales(!|%21)A1(:|%3A)Z1:append"))
            .match_query(Matcher::UrlEncoded(
                "insertDataOption".into(),
                "INSERT_ROWS".into(),
            ))
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let client = client(&server.url());
        let pen: FieldMap = [("product", FieldValue::Text("Pen".into()))]
            .into_iter()
            .collect();
        let cup: FieldMap = [("product", FieldValue::Text("Cup".into()))]
            .into_iter()
            .collect();
        let (a, b) = tokio::join!(client.append_row(&pen), client.append_row(&cup));
        a.unwrap();
        b.unwrap();
        write.assert_async().await;
    }

    #[tokio::test]
    async fn missing_header_row_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _headers = header_mock(&mut server, r#"{"range":"Sales!A1:Z1"}"#).await;
        let write = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let store: Arc<dyn TabularStore> = Arc::new(client(&server.url()));
        let err = store.write_row(&laptop()).await.unwrap_err();
        assert!(err.to_string().contains("no header row"), "{err}");
        write.assert_async().await;
    }

    #[tokio::test]
    async fn api_failure_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let store: Arc<dyn TabularStore> = Arc::new(client(&server.url()));
        let err = store.write_row(&laptop()).await.unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn empty_row_is_rejected_without_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = client(&server.url())
            .append_row(&FieldMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty row"));
        mock.assert_async().await;
    }
}

use crate::client::Client;
use crate::{ClientError, Result};
use odoorpc_core::{Domain, DomainTerm, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// One record as returned by `search_read`
pub type Record = Map<String, Value>;

/// Whether `search` has been applied yet
#[derive(Debug, Clone, PartialEq)]
enum Selection {
    /// Terminal calls operate on every record ("match all")
    Unbound,
    Bound(Domain),
}

/// Chainable query builder for one model
///
/// ```rust,no_run
/// # async fn demo(client: &odoorpc_rs::Client) -> odoorpc_rs::Result<()> {
/// use serde_json::json;
///
/// let partners = client
///     .model("res.partner")
///     .search(json!([["name", "ilike", "Test"]]))?
///     .read(&["name"])
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Model<'a> {
    client: &'a Client,
    name: String,
    selection: Selection,
    fields: Vec<String>,
}

impl<'a> Model<'a> {
    pub(crate) fn new(client: &'a Client, name: String) -> Self {
        Self {
            client,
            name,
            selection: Selection::Unbound,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.selection, Selection::Bound(_))
    }

    /// Current domain; empty until `search` binds one
    pub fn domain(&self) -> &[DomainTerm] {
        match &self.selection {
            Selection::Unbound => &[],
            Selection::Bound(domain) => domain.terms(),
        }
    }

    /// Fields selected by the last `read`
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Bind a domain. Validates its shape; performs no I/O.
    pub fn search<D>(mut self, domain: D) -> Result<Self>
    where
        D: TryInto<Domain>,
        ValidationError: From<D::Error>,
    {
        let domain = domain.try_into().map_err(ValidationError::from)?;
        self.selection = Selection::Bound(domain);
        Ok(self)
    }

    /// `search_read` over the current domain
    pub async fn read<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<Vec<Record>> {
        self.read_as(fields).await
    }

    /// `search_read`, decoding each record into `T`
    pub async fn read_as<T, S>(&mut self, fields: &[S]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        self.fields = fields.iter().map(|f| f.as_ref().to_string()).collect();

        let domain = match &self.selection {
            Selection::Unbound => json!([]),
            Selection::Bound(domain) => serde_json::to_value(domain)?,
        };
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(self.fields));

        let records = self.call("search_read", vec![domain], kwargs).await?;
        Ok(serde_json::from_value(records)?)
    }

    /// Create one record; returns the new id(s)
    pub async fn create<V: Serialize>(&self, values: &V) -> Result<Vec<i64>> {
        let batch = json!([serde_json::to_value(values)?]);
        let result = self.call("create", vec![batch], Map::new()).await?;
        ids_from(result)
    }

    pub async fn write<V: Serialize>(&self, ids: &[i64], values: &V) -> Result<bool> {
        let args = vec![json!(ids), serde_json::to_value(values)?];
        let result = self.call("write", args, Map::new()).await?;
        flag_from("write", result)
    }

    pub async fn unlink(&self, ids: &[i64]) -> Result<bool> {
        let result = self.call("unlink", vec![json!(ids)], Map::new()).await?;
        flag_from("unlink", result)
    }

    /// Any remote method of this model, result returned verbatim
    pub async fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        self.client.call_kw(&self.name, method, args, kwargs).await
    }

    /// Render `report_name` for `ids` as PDF bytes
    pub async fn print(&self, report_name: &str, ids: &[i64]) -> Result<Vec<u8>> {
        if report_name.is_empty() {
            return Err(ValidationError::MissingReportName.into());
        }
        if ids.is_empty() {
            return Err(ValidationError::MissingIds.into());
        }

        let ids = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.client
            .fetch_binary(&format!("/report/pdf/{report_name}/{ids}"))
            .await
    }
}

/// `create` answers with one id or a list depending on server version
fn ids_from(result: Value) -> Result<Vec<i64>> {
    let invalid =
        |value: &Value| ClientError::InvalidResponse(format!("expected record id, got {value}"));
    match &result {
        Value::Number(id) => id.as_i64().map(|id| vec![id]).ok_or_else(|| invalid(&result)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_i64().ok_or_else(|| invalid(item)))
            .collect(),
        other => Err(invalid(other)),
    }
}

fn flag_from(method: &str, result: Value) -> Result<bool> {
    result.as_bool().ok_or_else(|| {
        ClientError::InvalidResponse(format!("{method} returned {result}, expected a boolean"))
    })
}

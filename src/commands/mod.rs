mod connect;
mod exec;
mod query;
mod schema;
mod validate;

pub use connect::run_connect;
pub use exec::run_exec;
pub use query::run_query;
pub use schema::run_schema;
pub use validate::run_validate;

use std::collections::HashMap;

use color_eyre::eyre::{eyre, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::adapter::{Adapter, ConnectionConfig, MySqlAdapter, PostgresAdapter, SqliteAdapter};
use crate::connections::{self, ConnectionRef};

/// Percent-encodes the user/password segments of a synthesised
/// connection URL so credentials containing reserved characters don't
/// corrupt the URL the driver parses.
const USERINFO: &AsciiSet = &CONTROLS.add(b':').add(b'@').add(b'/').add(b'?').add(b'#');

/// Races `fut` against Ctrl-C. `None` means the signal won first; the
/// caller is responsible for closing the adapter and skipping the
/// query-log entry, since the signal drops `fut` and whatever borrow it
/// holds on the adapter before reaching that point.
pub async fn race_ctrl_c<T>(fut: impl std::future::Future<Output = T>) -> Option<T> {
  tokio::select! {
    result = fut => Some(result),
    _ = tokio::signal::ctrl_c() => None,
  }
}

/// Resolves a connection reference (registry name or `type:k=v,...`)
/// into a connected adapter instance.
pub async fn resolve_adapter(raw: &str) -> Result<Box<dyn Adapter>> {
  let (db_type, url) = match connections::parse_connection_ref(raw) {
    ConnectionRef::Named(name) => {
      let record = connections::get_connection(&name).ok_or_else(|| eyre!("no saved connection named `{name}`"))?;
      (record.db_type, record.url)
    },
    ConnectionRef::Raw { db_type, params } => (db_type.clone(), raw_params_to_url(&db_type, &params)),
  };

  let mut adapter: Box<dyn Adapter> = match db_type.as_str() {
    "postgres" | "postgresql" => Box::new(PostgresAdapter::default()),
    "mysql" => Box::new(MySqlAdapter::default()),
    "sqlite" => Box::new(SqliteAdapter::default()),
    other => return Err(eyre!("unsupported engine type `{other}`")),
  };
  adapter.connect(ConnectionConfig { url }).await.map_err(|e| eyre!(e.to_string()))?;
  Ok(adapter)
}

fn raw_params_to_url(db_type: &str, params: &HashMap<String, String>) -> String {
  if let Some(url) = params.get("url") {
    return url.clone();
  }
  let host = params.get("host").cloned().unwrap_or_else(|| "localhost".to_string());
  let port = params.get("port").cloned();
  let database = params.get("database").cloned().unwrap_or_default();
  let user = utf8_percent_encode(params.get("user").map(String::as_str).unwrap_or_default(), USERINFO).to_string();
  let password =
    utf8_percent_encode(params.get("password").map(String::as_str).unwrap_or_default(), USERINFO).to_string();
  let scheme = match db_type {
    "postgres" | "postgresql" => "postgres",
    "mysql" => "mysql",
    _ => db_type,
  };
  match port {
    Some(port) => format!("{scheme}://{user}:{password}@{host}:{port}/{database}"),
    None => format!("{scheme}://{user}:{password}@{host}/{database}"),
  }
}

//! `connect`: manage the named-connection registry.

use color_eyre::eyre::Result;

use crate::cli::{ConnectAction, ConnectArgs};
use crate::connections::{self, ConnectionRecord};

pub fn run_connect(args: ConnectArgs) -> Result<i32> {
  match args.action {
    ConnectAction::List => {
      let entries = connections::list_connections();
      if entries.is_empty() {
        println!("no saved connections");
      }
      for (name, record) in entries {
        println!("{name}\t{}", record.db_type);
      }
    },
    ConnectAction::Add { name, db_type, url } => {
      connections::save_connection(&name, ConnectionRecord { db_type, url })?;
      println!("saved connection `{name}`");
    },
    ConnectAction::Remove { name } => {
      if connections::remove_connection(&name)? {
        println!("removed connection `{name}`");
      } else {
        println!("no saved connection named `{name}`");
      }
    },
  }
  Ok(0)
}

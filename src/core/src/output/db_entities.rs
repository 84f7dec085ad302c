//! SeaORM entity models used by the database output.
//!
//! These structs map to the SQLite tables created by `database_output`:
//! - `sessions`: one row per honeypot session, closed on connection loss
//! - `auths`: every login attempt, successful or not
//! - `inputs`: shell commands and raw input lines
//! - `downloads`: files fetched into the sandbox
//! - `forwards`: direct-tcpip forwarding requests
//! - `ttylogs`: terminal recordings, stored when the session ends
//!
//! Timestamps are ISO8601 UTC strings for portability.

/// Sessions table entity model.
pub mod sessions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "sessions")]
    pub struct Model {
        /// Durable session id
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub starttime: String,
        pub endtime: Option<String>,
        pub sensor: String,
        /// Peer IP address
        pub ip: String,
        /// Peer port
        pub port: i32,
        /// `<width>x<height>` once negotiated
        pub termsize: Option<String>,
        /// Client version string
        pub client: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Login attempts.
pub mod auths {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "auths")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub session: String,
        pub success: bool,
        pub username: String,
        pub password: String,
        pub timestamp: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Commands and raw input. `success` tells recognized commands from unknown
/// ones; plain input lines carry their realm instead.
pub mod inputs {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "inputs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub session: String,
        pub timestamp: String,
        pub realm: Option<String>,
        pub success: Option<bool>,
        pub input: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod downloads {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "downloads")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub session: String,
        pub timestamp: String,
        pub url: String,
        pub outfile: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod forwards {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "forwards")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub session: String,
        pub timestamp: String,
        pub dst_ip: String,
        pub dst_port: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Terminal recordings, at most 10 MiB each.
pub mod ttylogs {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "ttylogs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub session: String,
        pub ttylog: Vec<u8>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Schema, one statement per table.
pub(crate) const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        starttime TEXT NOT NULL,
        endtime TEXT,
        sensor TEXT NOT NULL,
        ip TEXT NOT NULL,
        port INTEGER NOT NULL,
        termsize TEXT,
        client TEXT
    );",
    "CREATE TABLE IF NOT EXISTS auths (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session TEXT NOT NULL,
        success INTEGER NOT NULL,
        username TEXT NOT NULL,
        password TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS inputs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        realm TEXT,
        success INTEGER,
        input TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS downloads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        url TEXT NOT NULL,
        outfile TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS forwards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        dst_ip TEXT NOT NULL,
        dst_port INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS ttylogs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session TEXT NOT NULL,
        ttylog BLOB NOT NULL
    );",
];

use std::fs;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
};
use tokio::runtime::Runtime;

use crate::configuration::DatabaseOutputConfig;
use crate::error_handling::types::SinkError;
use crate::event_taxonomy::{
    ClientVersion, CommandInput, ConnectionLost, FileDownload, ForwardRequest, Input,
    LoginAttempt, TerminalSize, TtyOpened,
};
use crate::output::db_entities::{auths, downloads, forwards, inputs, sessions, ttylogs, SCHEMA};
use crate::output::output_trait::{sink_settings, EventContext, OutputSink};

pub const NAME: &str = "database";

fn iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// SQLite-backed output.
///
/// SeaORM is async; the router is not. The output owns a current-thread
/// runtime and blocks on it for each statement, so it must not be driven from
/// inside another tokio runtime.
#[derive(Default)]
pub struct DatabaseOutput {
    rt: Option<Runtime>,
    db: Option<DatabaseConnection>,
}

impl DatabaseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> Result<(&Runtime, &DatabaseConnection), SinkError> {
        match (&self.rt, &self.db) {
            (Some(rt), Some(db)) => Ok((rt, db)),
            _ => Err(SinkError::NotStarted),
        }
    }

    fn insert_auth(
        &self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
        success: bool,
    ) -> Result<(), SinkError> {
        let (rt, db) = self.handles()?;
        let row = auths::ActiveModel {
            id: NotSet,
            session: Set(ctx.session.durable_id.clone()),
            success: Set(success),
            username: Set(event.username.clone()),
            password: Set(event.password.clone()),
            timestamp: Set(ctx.timestamp()),
        };
        rt.block_on(auths::Entity::insert(row).exec(db))?;
        Ok(())
    }

    fn insert_input(
        &self,
        ctx: &EventContext<'_>,
        input: &str,
        realm: Option<&str>,
        success: Option<bool>,
    ) -> Result<(), SinkError> {
        let (rt, db) = self.handles()?;
        let row = inputs::ActiveModel {
            id: NotSet,
            session: Set(ctx.session.durable_id.clone()),
            timestamp: Set(ctx.timestamp()),
            realm: Set(realm.map(str::to_owned)),
            success: Set(success),
            input: Set(input.to_string()),
        };
        rt.block_on(inputs::Entity::insert(row).exec(db))?;
        Ok(())
    }

    fn update_session(
        &self,
        ctx: &EventContext<'_>,
        column: sessions::Column,
        value: String,
    ) -> Result<(), SinkError> {
        let (rt, db) = self.handles()?;
        let result = rt.block_on(
            sessions::Entity::update_many()
                .col_expr(column, Expr::value(value))
                .filter(sessions::Column::Id.eq(ctx.session.durable_id.clone()))
                .exec(db),
        )?;
        if result.rows_affected == 0 {
            warn!(
                "[{}] No session row to update ({:?})",
                ctx.session.durable_id, column
            );
        }
        Ok(())
    }

    /// Insert the session's recording, if one was announced.
    fn store_ttylog(&self, ctx: &EventContext<'_>) -> Result<(), SinkError> {
        if !ctx.has_ttylog() {
            return Ok(());
        }
        let bytes = match ctx.ttylog() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[{}] TTY log not stored: {}", ctx.session.durable_id, e);
                return Ok(());
            }
        };
        let (rt, db) = self.handles()?;
        let row = ttylogs::ActiveModel {
            id: NotSet,
            session: Set(ctx.session.durable_id.clone()),
            ttylog: Set(bytes),
        };
        rt.block_on(ttylogs::Entity::insert(row).exec(db))?;
        Ok(())
    }
}

impl OutputSink for DatabaseOutput {
    fn name(&self) -> &str {
        NAME
    }

    fn start(&mut self, config: &toml::Table) -> Result<(), SinkError> {
        let settings: DatabaseOutputConfig = sink_settings(NAME, config)?;
        if let Some(parent) = settings.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let url = format!("sqlite://{}?mode=rwc", settings.path.display());
        let db = rt.block_on(async {
            let db = Database::connect(url.as_str()).await?;
            for statement in SCHEMA {
                db.execute_unprepared(statement).await?;
            }
            Ok::<_, sea_orm::DbErr>(db)
        });
        let db = db.map_err(|e| {
            error!("Failed to open database {}: {}", settings.path.display(), e);
            SinkError::from(e)
        })?;
        info!("Database output connected to {}", settings.path.display());
        self.rt = Some(rt);
        self.db = Some(db);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        if let (Some(rt), Some(db)) = (self.rt.take(), self.db.take()) {
            rt.block_on(db.close())?;
            debug!("Database output closed");
        }
        Ok(())
    }

    fn on_session_created(&mut self, ctx: &EventContext<'_>) -> Result<(), SinkError> {
        let (rt, db) = self.handles()?;
        let session = ctx.session;
        let row = sessions::ActiveModel {
            id: Set(session.durable_id.clone()),
            starttime: Set(iso(session.created_at)),
            endtime: Set(None),
            sensor: Set(session.sensor.clone()),
            ip: Set(session.peer_addr.ip().to_string()),
            port: Set(i32::from(session.peer_addr.port())),
            termsize: Set(None),
            client: Set(None),
        };
        rt.block_on(sessions::Entity::insert(row).exec(db))?;
        Ok(())
    }

    fn on_login_success(
        &mut self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
    ) -> Result<(), SinkError> {
        self.insert_auth(ctx, event, true)
    }

    fn on_login_failure(
        &mut self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
    ) -> Result<(), SinkError> {
        self.insert_auth(ctx, event, false)
    }

    fn on_tty_opened(
        &mut self,
        ctx: &EventContext<'_>,
        event: &TtyOpened,
    ) -> Result<(), SinkError> {
        // the recording itself is stored on connection loss
        debug!("[{}] TTY log opened at {}", ctx.session.durable_id, event.logfile);
        Ok(())
    }

    fn on_command(
        &mut self,
        ctx: &EventContext<'_>,
        event: &CommandInput,
    ) -> Result<(), SinkError> {
        self.insert_input(ctx, &event.input, None, Some(true))
    }

    fn on_unknown_command(
        &mut self,
        ctx: &EventContext<'_>,
        event: &CommandInput,
    ) -> Result<(), SinkError> {
        self.insert_input(ctx, &event.input, None, Some(false))
    }

    fn on_file_download(
        &mut self,
        ctx: &EventContext<'_>,
        event: &FileDownload,
    ) -> Result<(), SinkError> {
        let (rt, db) = self.handles()?;
        let row = downloads::ActiveModel {
            id: NotSet,
            session: Set(ctx.session.durable_id.clone()),
            timestamp: Set(ctx.timestamp()),
            url: Set(event.url.clone()),
            outfile: Set(event.outfile.clone()),
        };
        rt.block_on(downloads::Entity::insert(row).exec(db))?;
        Ok(())
    }

    fn on_input(&mut self, ctx: &EventContext<'_>, event: &Input) -> Result<(), SinkError> {
        self.insert_input(ctx, &event.input, Some(&event.realm), None)
    }

    fn on_client_version(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ClientVersion,
    ) -> Result<(), SinkError> {
        self.update_session(ctx, sessions::Column::Client, event.version.clone())
    }

    fn on_terminal_size(
        &mut self,
        ctx: &EventContext<'_>,
        event: &TerminalSize,
    ) -> Result<(), SinkError> {
        self.update_session(
            ctx,
            sessions::Column::Termsize,
            format!("{}x{}", event.width, event.height),
        )
    }

    fn on_connection_lost(
        &mut self,
        ctx: &EventContext<'_>,
        _event: &ConnectionLost,
    ) -> Result<(), SinkError> {
        let stored = self.store_ttylog(ctx);
        if let Err(e) = &stored {
            error!("[{}] Failed to store TTY log: {}", ctx.session.durable_id, e);
        }
        // the session row is closed even when the recording could not be stored
        let closed = self.update_session(ctx, sessions::Column::Endtime, ctx.timestamp());
        stored.and(closed)
    }

    fn on_forward_request(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ForwardRequest,
    ) -> Result<(), SinkError> {
        let (rt, db) = self.handles()?;
        let row = forwards::ActiveModel {
            id: NotSet,
            session: Set(ctx.session.durable_id.clone()),
            timestamp: Set(ctx.timestamp()),
            dst_ip: Set(event.dst_ip.to_string()),
            dst_port: Set(i32::from(event.dst_port)),
        };
        rt.block_on(forwards::Entity::insert(row).exec(db))?;
        Ok(())
    }
}

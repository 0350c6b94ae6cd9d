//! Subcommand handlers.

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use factorlock_core::storage::FileStore;
use factorlock_core::{
    ControllerConfig, Factor, SecurityViolation, UserBundle, UserId, ValidationSnapshot,
};
use serde::Serialize;

use crate::client::{build_request, ValidationClient};
use crate::page::{session_file, Page};

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    pub state_dir: PathBuf,
    pub session: String,
    pub config: ControllerConfig,
    pub fast: bool,
}

impl Context {
    fn page(&self) -> eyre::Result<Page> {
        Page::load(&self.state_dir, &self.session, self.config.clone())
    }

    /// Loads a page for a command that is not a reload.
    fn quiet_page(&self) -> eyre::Result<Page> {
        let page = self.page()?;
        page.discard_replay();
        Ok(page)
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(flatten)]
    snapshot: ValidationSnapshot,
    user: Option<UserBundle>,
    security_violation: Option<SecurityViolation>,
}

pub fn status(ctx: &Context, json: bool) -> eyre::Result<()> {
    let page = ctx.quiet_page()?;
    let report = StatusReport {
        snapshot: page.controller.snapshot(),
        user: page.controller.user_bundle(),
        security_violation: page.controller.security_violation(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("FACTOR     VALIDATED  SESSION    USER");
    for status in &report.snapshot.factors {
        println!(
            "{:<10} {:<10} {:<10} {}",
            status.factor,
            yes_no(status.validated),
            yes_no(status.session_validated),
            status.user_id.as_ref().map_or("-", UserId::as_str),
        );
    }
    println!(
        "validated: {}/{}, this session: {}, welcome shown: {}",
        report.snapshot.valid_count,
        Factor::ALL.len(),
        report.snapshot.session_count,
        yes_no(report.snapshot.welcome_shown),
    );
    if let Some(bundle) = &report.user {
        println!(
            "user: {} ({} vehicles)",
            bundle.display_name(),
            bundle.vehicles.len()
        );
    }
    if let Some(violation) = &report.security_violation {
        println!("security violation: {}", violation.message());
    }
    Ok(())
}

pub async fn validate(ctx: &Context, factor: &str, user: Option<String>) -> eyre::Result<()> {
    let factor = Factor::parse(factor)?;
    let page = ctx.quiet_page()?;
    page.controller
        .set_validated(factor, true, user.map(UserId::from));
    page.render_pending(ctx.fast).await;
    Ok(())
}

pub async fn invalidate(ctx: &Context, factor: &str) -> eyre::Result<()> {
    let factor = Factor::parse(factor)?;
    let page = ctx.quiet_page()?;
    page.controller.set_validated(factor, false, None);
    page.render_pending(ctx.fast).await;
    Ok(())
}

pub async fn submit(ctx: &Context, factor: &str, file: &Path, server: &str) -> eyre::Result<()> {
    let factor = Factor::parse(factor)?;
    let page = ctx.quiet_page()?;
    let request = build_request(factor, file, page.controller.request_context())?;
    let response = ValidationClient::new(server).submit(factor, &request).await?;

    if response.success {
        let confidence = response
            .confidence
            .map_or_else(String::new, |confidence| format!(" ({confidence:.2})"));
        println!("{factor}: matched{confidence}");
    } else if let Some(error) = &response.error {
        println!("{factor}: {error}");
    } else {
        println!("{factor}: not matched");
    }
    page.controller.apply_server_response(factor, &response);
    page.render_pending(ctx.fast).await;
    Ok(())
}

pub async fn reload(ctx: &Context) -> eyre::Result<()> {
    let page = ctx.page()?;
    page.render_pending(ctx.fast).await;
    Ok(())
}

pub fn reset(ctx: &Context) -> eyre::Result<()> {
    ctx.quiet_page()?.controller.reset_all();
    println!("all validations reset");
    Ok(())
}

pub fn end_session(ctx: &Context) -> eyre::Result<()> {
    FileStore::open(session_file(&ctx.state_dir, &ctx.session))?
        .clear()
        .wrap_err("failed to remove session state")?;
    println!("session {} ended", ctx.session);
    Ok(())
}

pub fn violation(ctx: &Context, clear: bool) -> eyre::Result<()> {
    let page = ctx.quiet_page()?;
    match page.controller.security_violation() {
        Some(violation) => {
            println!("{}", violation.message());
            if clear {
                page.controller.clear_security_violation();
            }
        }
        None => println!("no security violation recorded"),
    }
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

//! The orchestrator: drives install/update/remove/show against any adapter
//! and owns the backup → validate → write → re-read → verify → rollback
//! protocol.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::clients::{adapter_for, McpClient, RawConfig};
use crate::errors::{Error, Result};
use crate::models::{
    InstallResult, Operation, Registration, Request, RunningState, ShowResult,
};

#[derive(Debug, Default)]
pub struct Installer;

impl Installer {
    pub fn new() -> Self {
        Installer
    }

    /// Sole entry point for mutating operations. `Show` requests are
    /// accepted too and reduced to their message for callers that do not
    /// need the full listing.
    pub fn execute(&self, request: &Request) -> Result<InstallResult> {
        let adapter = adapter_for(request.client, request.config_path.clone());
        self.execute_with(adapter.as_ref(), request)
    }

    pub fn show(&self, request: &Request) -> Result<ShowResult> {
        let adapter = adapter_for(request.client, request.config_path.clone());
        self.show_with(adapter.as_ref(), request)
    }

    pub fn execute_with(
        &self,
        adapter: &dyn McpClient,
        request: &Request,
    ) -> Result<InstallResult> {
        match request.operation {
            Operation::Install => self.install(adapter, request),
            Operation::Update => self.update(adapter, request),
            Operation::Remove => self.remove(adapter, request),
            Operation::Show => {
                let show = self.show_with(adapter, request)?;
                Ok(InstallResult {
                    success: show.success,
                    config_path: show.config_path,
                    backup_path: None,
                    message: show.message,
                })
            }
        }
    }

    fn install(&self, adapter: &dyn McpClient, request: &Request) -> Result<InstallResult> {
        info!(
            client = %request.client,
            vertical = %request.vertical,
            dry_run = request.dry_run,
            "starting installation"
        );
        validate_api_key(&request.api_key)?;

        let running = self.check_running(adapter, request)?;
        let config_path = adapter.config_path()?;
        let current = adapter.load_config()?;

        if adapter.has_server(&current, request.vertical)? {
            return Err(Error::AlreadyInstalled(request.client));
        }

        if request.dry_run {
            info!(path = %config_path.display(), "dry run, would install server");
            return Ok(InstallResult {
                success: true,
                config_path: config_path.clone(),
                backup_path: None,
                message: format!(
                    "Would install Kirha MCP server ({}) to {}",
                    request.vertical.server_name(),
                    config_path.display()
                ),
            });
        }

        self.apply_registration(
            adapter,
            request,
            current,
            &request.api_key,
            request.plan_mode,
            "installed",
            running,
        )
    }

    fn update(&self, adapter: &dyn McpClient, request: &Request) -> Result<InstallResult> {
        info!(
            client = %request.client,
            vertical = %request.vertical,
            dry_run = request.dry_run,
            "starting update"
        );

        let running = self.check_running(adapter, request)?;
        let config_path = adapter.config_path()?;
        let current = adapter.load_config()?;

        if !adapter.has_server(&current, request.vertical)? {
            return Err(Error::NotFoundForUpdate(request.client));
        }
        let existing = adapter.server_config(&current, request.vertical)?;

        // Credential reuse is an explicit opt-in (plan-mode-only updates),
        // never an implicit fallback.
        let api_key = if !request.api_key.is_empty() {
            validate_api_key(&request.api_key)?;
            request.api_key.clone()
        } else if request.reuse_existing_key {
            let key = existing
                .api_key()
                .map(str::to_string)
                .ok_or(Error::ApiKeyRequired)?;
            validate_api_key(&key)?;
            info!("re-using the credential already stored in the configuration");
            key
        } else {
            return Err(Error::ApiKeyRequired);
        };

        // A plan-mode toggle wins; otherwise the stored setting carries over.
        let plan_mode = request.plan_mode.or_else(|| existing.plan_mode());

        if request.dry_run {
            info!(path = %config_path.display(), "dry run, would update server");
            return Ok(InstallResult {
                success: true,
                config_path: config_path.clone(),
                backup_path: None,
                message: format!(
                    "Would update Kirha MCP server ({}) in {}",
                    request.vertical.server_name(),
                    config_path.display()
                ),
            });
        }

        // Re-inserting a fresh entry is how credential and flag changes take
        // effect; there is no patch operation on the adapter contract.
        let without_server = adapter.remove_server(current, request.vertical)?;

        self.apply_registration(
            adapter,
            request,
            without_server,
            &api_key,
            plan_mode,
            "updated",
            running,
        )
    }

    fn remove(&self, adapter: &dyn McpClient, request: &Request) -> Result<InstallResult> {
        info!(
            client = %request.client,
            vertical = %request.vertical,
            dry_run = request.dry_run,
            "starting removal"
        );

        let running = self.check_running(adapter, request)?;
        let config_path = adapter.config_path()?;
        let current = adapter.load_config()?;

        if !adapter.has_server(&current, request.vertical)? {
            return Err(Error::NotFoundForRemove(request.client));
        }

        if request.dry_run {
            info!(path = %config_path.display(), "dry run, would remove server");
            return Ok(InstallResult {
                success: true,
                config_path: config_path.clone(),
                backup_path: None,
                message: format!(
                    "Would remove Kirha MCP server ({}) from {}",
                    request.vertical.server_name(),
                    config_path.display()
                ),
            });
        }

        let backup_path = self.try_backup(adapter);

        let updated = match adapter.remove_server(current, request.vertical) {
            Ok(updated) => updated,
            Err(err) => {
                self.rollback(adapter, &backup_path, &err);
                return Err(err);
            }
        };
        if let Err(err) = adapter.save_config(&updated) {
            self.rollback(adapter, &backup_path, &err);
            return Err(err);
        }

        let mut message = format!(
            "Successfully removed Kirha MCP server ({}) from {}",
            request.vertical.server_name(),
            request.client
        );
        if running.is_running() {
            message.push_str(". Please restart the application to apply changes.");
        }

        info!(
            config_path = %config_path.display(),
            backup_path = ?backup_path,
            "removal completed successfully"
        );
        Ok(InstallResult {
            success: true,
            config_path,
            backup_path,
            message,
        })
    }

    fn show_with(&self, adapter: &dyn McpClient, request: &Request) -> Result<ShowResult> {
        info!(client = %request.client, "showing configuration");
        let config_path = adapter.config_path()?;

        let current = match adapter.load_config() {
            Ok(current) => current,
            Err(err) => {
                // Unreadable config is a reportable state for show, not a
                // failure.
                warn!(error = %err, "could not load configuration");
                return Ok(ShowResult {
                    success: false,
                    config_path: config_path.clone(),
                    has_server: false,
                    server: None,
                    listing: String::new(),
                    message: format!(
                        "Configuration could not be read at {}",
                        config_path.display()
                    ),
                });
            }
        };

        let has_server = adapter.has_server(&current, request.vertical)?;
        let listing = adapter.format_config(&current, false)?;

        let (server, message) = if has_server {
            let server = adapter.server_config(&current, request.vertical)?;
            let detail = adapter.format_server(&current, request.vertical)?;
            let message = format!(
                "Kirha MCP server ({}) is configured for {}:\n\n{}",
                request.vertical.server_name(),
                request.client,
                detail
            );
            (Some(server), message)
        } else if listing == "No MCP servers configured" {
            (None, format!("No MCP servers configured for {}", request.client))
        } else {
            (
                None,
                format!(
                    "Kirha MCP server ({}) not found for {}, but other servers are configured:\n\n{}",
                    request.vertical.server_name(),
                    request.client,
                    listing
                ),
            )
        };

        info!(
            config_path = %config_path.display(),
            has_server,
            "configuration displayed"
        );
        Ok(ShowResult {
            success: true,
            config_path,
            has_server,
            server,
            listing,
            message,
        })
    }

    /// Shared tail of install and update: backup, pre-validate, add, save,
    /// re-read, post-validate, with rollback on any mutating failure.
    #[allow(clippy::too_many_arguments)]
    fn apply_registration(
        &self,
        adapter: &dyn McpClient,
        request: &Request,
        current: RawConfig,
        api_key: &str,
        plan_mode: Option<bool>,
        verb: &str,
        running: RunningState,
    ) -> Result<InstallResult> {
        let config_path = adapter.config_path()?;
        let backup_path = self.try_backup(adapter);

        adapter.validate_config(&current)?;

        let server = Registration::kirha(
            api_key,
            request.vertical,
            adapter.transport_kind(),
            plan_mode,
        );

        let updated = match adapter.add_server(current, &server) {
            Ok(updated) => updated,
            Err(err) => {
                self.rollback(adapter, &backup_path, &err);
                return Err(err);
            }
        };
        if let Err(err) = adapter.save_config(&updated) {
            self.rollback(adapter, &backup_path, &err);
            return Err(err);
        }

        // Round-trip check: an adapter that serializes output its own parser
        // rejects must not be silently accepted.
        let reloaded = match adapter.load_config() {
            Ok(reloaded) => reloaded,
            Err(err) => {
                self.rollback(adapter, &backup_path, &err);
                return Err(Error::InstallationFailed("saved config could not be re-read"));
            }
        };
        if let Err(err) = adapter.validate_config(&reloaded) {
            self.rollback(adapter, &backup_path, &err);
            return Err(Error::InstallationFailed("saved config failed validation"));
        }

        let mut message = format!(
            "Successfully {} Kirha MCP server ({}) for {}",
            verb, server.name, request.client
        );
        if running.is_running() {
            message.push_str(". Please restart the application to activate the MCP server.");
        }

        info!(
            config_path = %config_path.display(),
            backup_path = ?backup_path,
            "{} completed successfully", verb
        );
        Ok(InstallResult {
            success: true,
            config_path,
            backup_path,
            message,
        })
    }

    /// Advisory probe: only a positive "running" result can block a mutating
    /// operation, and force/dry-run override even that.
    fn check_running(&self, adapter: &dyn McpClient, request: &Request) -> Result<RunningState> {
        let state = adapter.is_running(request.probe_timeout);
        if state == RunningState::Unknown {
            warn!(
                client = %request.client,
                "could not determine whether the client is running, assuming it is not"
            );
        }
        if state.is_running() && !request.dry_run && !request.force {
            warn!(client = %request.client, "client is currently running");
            return Err(Error::ClientRunning(request.client));
        }
        Ok(state)
    }

    /// Backup is best-effort: a failure is logged and the mutation still
    /// proceeds, but a successful backup becomes the rollback point.
    fn try_backup(&self, adapter: &dyn McpClient) -> Option<PathBuf> {
        match adapter.backup_config() {
            Ok(backup) => backup,
            Err(err) => {
                warn!(error = %err, "failed to create backup, continuing without one");
                None
            }
        }
    }

    /// Restore the pre-mutation backup. A restore failure is logged as a
    /// secondary line so the primary error stays visible.
    fn rollback(&self, adapter: &dyn McpClient, backup_path: &Option<PathBuf>, cause: &Error) {
        let Some(backup_path) = backup_path else {
            return;
        };
        error!(error = %cause, "operation failed, restoring backup");
        if let Err(restore_err) = adapter.restore_config(backup_path) {
            error!(error = %restore_err, "failed to restore backup");
        }
    }
}

fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(Error::ApiKeyRequired);
    }
    if api_key.trim() != api_key || api_key.contains(' ') {
        return Err(Error::ApiKeyInvalid);
    }
    Ok(())
}

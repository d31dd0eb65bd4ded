//! ipset backend - staged full replacement applied with `ipset restore`

use std::collections::BTreeMap;

use async_trait::async_trait;
use ovn_gateway_common::{shell, GatewayError, GatewayResult};
use parking_lot::Mutex;
use tracing::debug;

use crate::backend::IpSetBackend;
use crate::commands::{build_ipset_restore_cmd, render_ipset_replace};
use crate::types::{IpSetMetadata, IpSetNaming, MAX_IPSET_NAME_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSet {
    meta: IpSetMetadata,
    members: Vec<String>,
}

/// Kernel ipset manager
///
/// Staged replacements are kept until a restore succeeds, so a failed apply
/// is retried by the next one.
pub struct IpSetManager {
    naming: IpSetNaming,

    /// Staged replacements keyed by set identifier
    pending: Mutex<BTreeMap<String, PendingSet>>,

    #[cfg(test)]
    mock_mode: bool,

    #[cfg(test)]
    mock_fail: Mutex<bool>,

    #[cfg(test)]
    captured_scripts: Mutex<Vec<String>>,
}

impl IpSetManager {
    pub fn new(naming: IpSetNaming) -> Self {
        Self {
            naming,
            pending: Mutex::new(BTreeMap::new()),
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            mock_fail: Mutex::new(false),
            #[cfg(test)]
            captured_scripts: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub fn new_mock(naming: IpSetNaming) -> Self {
        let mut mgr = Self::new(naming);
        mgr.mock_mode = true;
        mgr
    }

    /// Number of sets waiting for the next apply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn check_name(&self, set_id: &str) -> GatewayResult<()> {
        let temp = self.naming.temp_name(set_id);
        if temp.len() > MAX_IPSET_NAME_LEN {
            return Err(GatewayError::ip_set(
                set_id,
                format!(
                    "kernel set name '{}' exceeds {} characters",
                    temp, MAX_IPSET_NAME_LEN
                ),
            ));
        }
        Ok(())
    }

    async fn restore(&self, script: &str) -> GatewayResult<()> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_scripts.lock().push(script.to_string());
            if *self.mock_fail.lock() {
                return Err(GatewayError::ShellCommandFailed {
                    command: build_ipset_restore_cmd(),
                    exit_code: 1,
                    output: "mock restore failure".to_string(),
                });
            }
            return Ok(());
        }

        shell::exec_with_stdin_or_throw(&build_ipset_restore_cmd(), script)
            .await
            .map(|_| ())
    }

    #[cfg(test)]
    fn set_mock_fail(&self, fail: bool) {
        *self.mock_fail.lock() = fail;
    }

    #[cfg(test)]
    fn captured_scripts(&self) -> Vec<String> {
        self.captured_scripts.lock().clone()
    }
}

#[async_trait]
impl IpSetBackend for IpSetManager {
    fn add_or_replace_ip_set(
        &self,
        meta: IpSetMetadata,
        members: Vec<String>,
    ) -> GatewayResult<()> {
        self.check_name(&meta.set_id)?;

        // Only well-formed members of the managed family reach the restore
        // script.
        let family = self.naming.family();
        let total = members.len();
        let members: Vec<String> = members
            .into_iter()
            .filter(|member| family.accepts(meta.set_type, member))
            .collect();
        if members.len() != total {
            debug!(
                set = %meta.set_id,
                skipped = total - members.len(),
                family = %family,
                "Skipping malformed or foreign-family members"
            );
        }

        if members.len() > meta.max_size {
            return Err(GatewayError::ip_set(
                &meta.set_id,
                format!(
                    "{} members exceed maxelem {}",
                    members.len(),
                    meta.max_size
                ),
            ));
        }

        self.pending
            .lock()
            .insert(meta.set_id.clone(), PendingSet { meta, members });
        Ok(())
    }

    async fn apply_updates(&self) -> GatewayResult<()> {
        let batch: Vec<PendingSet> = self.pending.lock().values().cloned().collect();
        if batch.is_empty() {
            return Ok(());
        }

        let mut script = String::new();
        for set in &batch {
            render_ipset_replace(&self.naming, &set.meta, &set.members, &mut script);
        }
        script.push_str("COMMIT\n");

        self.restore(&script)
            .await
            .map_err(|e| GatewayError::ip_set("*", e.to_string()))?;

        let mut pending = self.pending.lock();
        for set in &batch {
            // Keep anything restaged while the restore was running.
            if pending.get(&set.meta.set_id) == Some(set) {
                pending.remove(&set.meta.set_id);
            }
        }

        for set in &batch {
            debug!(
                set = %self.naming.main_name(&set.meta.set_id),
                members = set.members.len(),
                "ipset replaced"
            );
        }
        Ok(())
    }
}

//! iptables rule backend

use async_trait::async_trait;
#[cfg(test)]
use std::collections::VecDeque;

use ovn_gateway_common::shell::{self, ExecResult};
use ovn_gateway_common::{GatewayError, GatewayResult};
#[cfg(test)]
use parking_lot::Mutex;
use tracing::info;

use crate::backend::RuleBackend;
use crate::commands::{build_iptables_append_cmd, build_iptables_check_cmd};
use crate::types::IpFamily;

/// `iptables -C` exit code for "no such rule"
const RULE_NOT_FOUND_EXIT: i32 = 1;

/// Rule backend driving `iptables` (or `ip6tables`) through the shell
pub struct Iptables {
    family: IpFamily,

    #[cfg(test)]
    mock_mode: bool,

    #[cfg(test)]
    mock_exit_codes: Mutex<VecDeque<i32>>,

    #[cfg(test)]
    captured_commands: Mutex<Vec<String>>,
}

impl Iptables {
    pub fn new(family: IpFamily) -> Self {
        Self {
            family,
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            mock_exit_codes: Mutex::new(VecDeque::new()),
            #[cfg(test)]
            captured_commands: Mutex::new(Vec::new()),
        }
    }

    /// Mock that captures commands and answers with queued exit codes
    /// (0 once the queue is empty).
    #[cfg(test)]
    pub fn new_mock(family: IpFamily, exit_codes: Vec<i32>) -> Self {
        let mut ipt = Self::new(family);
        ipt.mock_mode = true;
        ipt.mock_exit_codes = Mutex::new(exit_codes.into());
        ipt
    }

    async fn exec(&self, cmd: &str) -> GatewayResult<ExecResult> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.lock().push(cmd.to_string());
            let exit_code = self.mock_exit_codes.lock().pop_front().unwrap_or(0);
            return Ok(ExecResult {
                exit_code,
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        shell::exec(cmd).await
    }

    #[cfg(test)]
    fn captured_commands(&self) -> Vec<String> {
        self.captured_commands.lock().clone()
    }
}

#[async_trait]
impl RuleBackend for Iptables {
    async fn exists(&self, table: &str, chain: &str, rule: &[String]) -> GatewayResult<bool> {
        let cmd = build_iptables_check_cmd(self.family, table, chain, rule);
        let result = self.exec(&cmd).await?;
        match result.exit_code {
            0 => Ok(true),
            RULE_NOT_FOUND_EXIT => Ok(false),
            code => Err(GatewayError::iptables(format!(
                "check in {}/{} exited {}: {}",
                table,
                chain,
                code,
                result.combined_output()
            ))),
        }
    }

    async fn append_unique(&self, table: &str, chain: &str, rule: &[String]) -> GatewayResult<()> {
        if self.exists(table, chain, rule).await? {
            return Ok(());
        }

        let cmd = build_iptables_append_cmd(self.family, table, chain, rule);
        let result = self.exec(&cmd).await?;
        if !result.success() {
            return Err(GatewayError::iptables(format!(
                "append to {}/{} exited {}: {}",
                table,
                chain,
                result.exit_code,
                result.combined_output()
            )));
        }

        info!(table = %table, chain = %chain, rule = %rule.join(" "), "iptables rule appended");
        Ok(())
    }
}

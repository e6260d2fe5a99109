//! `FakeBrowser`: a single struct satisfying `Page`, `Wallet`, `Context` and
//! `Tracing` for tests, mirroring the teacher's "one fake backs every trait"
//! convention (`oxidized_state::fakes::MemoryCasStore`).

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SandboxResult;
use crate::traits::{Context, Frame, Page, TabInfo, Tracing, Wallet};

#[derive(Debug, Clone)]
pub struct FakeBrowserConfig {
    /// Step 1: a wallet notification tab is already open when `drive` starts.
    pub notification_open_on_start: bool,
    /// Step 2: the wallet's own helper (`approve`/`sign`/…) succeeds.
    pub helper_responds: bool,
    /// Steps 1 and 3: a found/opened notification tab can be driven to completion.
    pub notification_drivable: bool,
}

impl Default for FakeBrowserConfig {
    fn default() -> Self {
        Self {
            notification_open_on_start: false,
            helper_responds: true,
            notification_drivable: true,
        }
    }
}

struct State {
    tabs: Vec<TabInfo>,
    tracing_frames: Vec<Frame>,
    tracing_active: bool,
}

pub struct FakeBrowser {
    config: FakeBrowserConfig,
    state: Mutex<State>,
}

impl FakeBrowser {
    pub fn new(config: FakeBrowserConfig) -> Self {
        let mut tabs = vec![TabInfo {
            id: "tab-main".into(),
            url: "https://example-dapp.test".into(),
            is_extension: false,
        }];
        if config.notification_open_on_start {
            tabs.push(TabInfo {
                id: "tab-wallet-notification".into(),
                url: "chrome-extension://wallet/notification.html".into(),
                is_extension: true,
            });
        }
        Self {
            config,
            state: Mutex::new(State {
                tabs,
                tracing_frames: Vec::new(),
                tracing_active: false,
            }),
        }
    }

    pub fn push_frame(&self, frame: Frame) {
        self.state.lock().unwrap().tracing_frames.push(frame);
    }
}

#[async_trait]
impl Page for FakeBrowser {
    async fn navigate(&self, _url: &str) -> SandboxResult<()> {
        Ok(())
    }
    async fn click(&self, _selector: &str) -> SandboxResult<()> {
        Ok(())
    }
    async fn type_text(&self, _selector: &str, _text: &str) -> SandboxResult<()> {
        Ok(())
    }
    async fn select(&self, _selector: &str, _value: &str) -> SandboxResult<()> {
        Ok(())
    }
    async fn press_key(&self, _key: &str) -> SandboxResult<()> {
        Ok(())
    }
    async fn scroll(&self, _dx: i64, _dy: i64) -> SandboxResult<()> {
        Ok(())
    }
    async fn wait(&self, _duration_ms: u64) -> SandboxResult<()> {
        Ok(())
    }
    async fn go_back(&self) -> SandboxResult<()> {
        Ok(())
    }
    async fn snapshot(&self) -> SandboxResult<String> {
        Ok("- generic [ref=e1]".to_string())
    }
    async fn evaluate(&self, _script: &str) -> SandboxResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
    async fn screenshot(&self) -> SandboxResult<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
    async fn url(&self) -> SandboxResult<String> {
        Ok(self.state.lock().unwrap().tabs[0].url.clone())
    }
}

#[async_trait]
impl Wallet for FakeBrowser {
    async fn approve(&self) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn sign(&self) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn confirm_transaction(&self) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn switch_network(&self, _name: &str) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn reject(&self) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn add_network(&self, _name: &str) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn handle_siwe_popup(&self) -> SandboxResult<bool> {
        Ok(self.config.helper_responds)
    }
    async fn get_address(&self) -> SandboxResult<String> {
        Ok("0xFAKE0000000000000000000000000000000001".to_string())
    }
    async fn open_notification(&self) -> SandboxResult<TabInfo> {
        let tab = TabInfo {
            id: "tab-wallet-notification".into(),
            url: "chrome-extension://wallet/notification.html".into(),
            is_extension: true,
        };
        self.state.lock().unwrap().tabs.push(tab.clone());
        Ok(tab)
    }
    async fn drive_popup(&self, _tab: &TabInfo, _action: &str) -> SandboxResult<bool> {
        Ok(self.config.notification_drivable)
    }
}

#[async_trait]
impl Context for FakeBrowser {
    async fn tabs(&self) -> SandboxResult<Vec<TabInfo>> {
        Ok(self.state.lock().unwrap().tabs.clone())
    }
    async fn bring_forward(&self, _tab_id: &str) -> SandboxResult<()> {
        Ok(())
    }
    async fn screenshot(&self) -> SandboxResult<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
    async fn close(&self) -> SandboxResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Tracing for FakeBrowser {
    async fn start(&self) -> SandboxResult<()> {
        self.state.lock().unwrap().tracing_active = true;
        Ok(())
    }
    async fn stop(&self) -> SandboxResult<Vec<Frame>> {
        let mut state = self.state.lock().unwrap();
        state.tracing_active = false;
        Ok(std::mem::take(&mut state.tracing_frames))
    }
}

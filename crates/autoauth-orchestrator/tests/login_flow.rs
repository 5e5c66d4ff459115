//! End-to-end login runs against a scripted CLI and a fake browser

use async_trait::async_trait;
use autoauth_browser::{AuthPage, DriverSettings, StopReason};
use autoauth_core::profile::ProfileLayout;
use autoauth_core::{AutoAuthError, Result, SelectorCache};
use autoauth_orchestrator::{BrowserLauncher, CodeOrigin, LoginContext, LoginWorkflow};
use autoauth_process::{AfterScript, AuthUrlMatcher, DrainPolicy, MockLoginProcess, ReaderPrompt};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const AUTH_URL: &str =
    "https://accounts.google.com/o/oauth2/auth?response_type=code&client_id=32555940559.apps";

/// How the fake browser behaves once launched
#[derive(Clone)]
enum Behavior {
    /// The page lands on a URL carrying this code
    Redirect(&'static str),
    /// Clicking the selector leads to a URL with the code
    ConsentButton { selector: &'static str, code: &'static str },
    /// The browser dies after the first URL read
    Crash,
    /// The browser never starts
    LaunchFails,
}

struct FakePage {
    behavior: Behavior,
    url: Mutex<String>,
    url_reads: Mutex<usize>,
}

#[async_trait]
impl AuthPage for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut current = self.url.lock().unwrap();
        *current = match &self.behavior {
            Behavior::Redirect(code) => format!("https://sdk.cloud.google.com/authcode.html?code={}", code),
            _ => url.to_string(),
        };
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let mut reads = self.url_reads.lock().unwrap();
        *reads += 1;
        if matches!(self.behavior, Behavior::Crash) && *reads > 1 {
            return Err(AutoAuthError::Browser("connection is closed".into()));
        }
        Ok(self.url.lock().unwrap().clone())
    }

    async fn page_text(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        Ok(matches!(&self.behavior, Behavior::ConsentButton { selector: s, .. } if *s == selector))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        match &self.behavior {
            Behavior::ConsentButton { selector: s, code } if *s == selector => {
                *self.url.lock().unwrap() = format!("https://localhost/?code={}&scope=email", code);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

struct FakeLauncher {
    behavior: Behavior,
    launched_with: Mutex<Vec<PathBuf>>,
    staged_files_seen: Mutex<Vec<PathBuf>>,
}

impl FakeLauncher {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            launched_with: Mutex::new(Vec::new()),
            staged_files_seen: Mutex::new(Vec::new()),
        }
    }

    fn launches(&self) -> Vec<PathBuf> {
        self.launched_with.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Page = FakePage;

    async fn launch(&self, profile_dir: &Path) -> Result<FakePage> {
        self.launched_with.lock().unwrap().push(profile_dir.to_path_buf());
        for name in ["Default/Network/Cookies", "Default/Preferences", "Local State"] {
            let path = profile_dir.join(name);
            if path.exists() {
                self.staged_files_seen.lock().unwrap().push(path);
            }
        }

        if matches!(self.behavior, Behavior::LaunchFails) {
            return Err(AutoAuthError::Browser("Failed to launch browser: no chrome".into()));
        }
        Ok(FakePage {
            behavior: self.behavior.clone(),
            url: Mutex::new(String::new()),
            url_reads: Mutex::new(0),
        })
    }
}

/// A Chromium user data dir with one profile
fn profiles_root() -> TempDir {
    let root = TempDir::new().unwrap();
    let default = root.path().join("Default");
    std::fs::create_dir_all(default.join("Network")).unwrap();
    std::fs::write(default.join("Network").join("Cookies"), b"sqlite").unwrap();
    std::fs::write(default.join("Preferences"), b"{}").unwrap();
    std::fs::write(root.path().join("Local State"), b"{}").unwrap();
    root
}

fn context(root: &Path, cache_path: Option<PathBuf>) -> LoginContext {
    LoginContext {
        matcher: AuthUrlMatcher::default(),
        url_timeout: Duration::from_millis(50),
        layout: ProfileLayout::Chromium,
        profiles_root: Some(root.to_path_buf()),
        cache_path,
        driver: DriverSettings {
            max_attempts: 3,
            click_timeout: Duration::from_millis(1),
            account_timeout: Duration::from_millis(1),
            wait_timeout: Duration::from_millis(5),
            poll_interval: Duration::from_millis(1),
            settle: Duration::from_millis(0),
            wait_for_top: 3,
            scrape_page_text: true,
            account_email: None,
        },
        drain: DrainPolicy {
            idle: Duration::from_millis(20),
            total: Duration::from_secs(1),
            exit_wait: Duration::from_millis(20),
        },
        open_fallback: false,
    }
}

fn gcloud() -> MockLoginProcess {
    MockLoginProcess::new(
        [
            "Go to the following link in your browser:".to_string(),
            String::new(),
            format!("    {}", AUTH_URL),
            String::new(),
        ],
        AfterScript::Block,
    )
    .with_replies(["You are now logged in as [me@example.com]."])
    .with_exit_code(0)
}

fn no_input() -> ReaderPrompt<Cursor<&'static [u8]>, Vec<u8>> {
    ReaderPrompt::new(Cursor::new(&b""[..]), Vec::new())
}

#[tokio::test]
async fn test_automated_login_relays_code() {
    let root = profiles_root();
    let workflow = LoginWorkflow::new(context(root.path(), None));
    let launcher = FakeLauncher::new(Behavior::Redirect("ABC"));
    let mut process = gcloud();

    let report = workflow
        .run(&mut process, &launcher, &mut no_input())
        .await
        .unwrap();

    assert_eq!(process.written(), ["ABC"]);
    assert_eq!(report.origin, CodeOrigin::Automated);
    assert_eq!(report.auth_url, AUTH_URL);
    assert_eq!(report.profile, root.path().join("Default"));
    assert_eq!(report.stop, Some(StopReason::CodeFound));
    assert_eq!(report.relay.lines_drained, 1);
    assert_eq!(report.relay.exit_code, Some(0));

    // The browser ran against a staged copy that is gone now
    let launches = launcher.launches();
    assert_eq!(launches.len(), 1);
    assert!(!launches[0].starts_with(root.path()));
    assert!(!launches[0].exists());
    assert_eq!(launcher.staged_files_seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_url_aborts_before_browser() {
    let root = profiles_root();
    let workflow = LoginWorkflow::new(context(root.path(), None));
    let launcher = FakeLauncher::new(Behavior::Redirect("ABC"));
    let mut process = MockLoginProcess::new(["ERROR: gcloud crashed"], AfterScript::Eof);

    let err = workflow
        .run(&mut process, &launcher, &mut no_input())
        .await
        .unwrap_err();

    assert!(matches!(err, AutoAuthError::AuthUrlNotFound(_)));
    assert!(err.is_fatal_discovery());
    assert!(launcher.launches().is_empty());
    assert!(process.written().is_empty());
}

#[tokio::test]
async fn test_missing_profile_aborts_before_browser() {
    let empty = TempDir::new().unwrap();
    let workflow = LoginWorkflow::new(context(empty.path(), None));
    let launcher = FakeLauncher::new(Behavior::Redirect("ABC"));
    let mut process = gcloud();

    let err = workflow
        .run(&mut process, &launcher, &mut no_input())
        .await
        .unwrap_err();

    assert!(matches!(err, AutoAuthError::ProfileNotFound { .. }));
    assert!(launcher.launches().is_empty());
}

#[tokio::test]
async fn test_browser_crash_cleans_up_and_prompts() {
    let root = profiles_root();
    let workflow = LoginWorkflow::new(context(root.path(), None));
    let launcher = FakeLauncher::new(Behavior::Crash);
    let mut process = gcloud();
    let mut prompt = ReaderPrompt::new(Cursor::new(&b"\n4/manual-code\n"[..]), Vec::new());

    let report = workflow.run(&mut process, &launcher, &mut prompt).await.unwrap();

    assert_eq!(report.origin, CodeOrigin::Manual);
    assert!(matches!(report.stop, Some(StopReason::SessionLost(_))));
    assert_eq!(process.written(), ["4/manual-code"]);

    let launches = launcher.launches();
    assert_eq!(launches.len(), 1);
    assert!(!launches[0].exists());

    let shown = String::from_utf8(prompt.into_writer()).unwrap();
    assert!(shown.contains("Enter authorization code:"));
}

#[tokio::test]
async fn test_launch_failure_falls_back_to_prompt() {
    let root = profiles_root();
    let workflow = LoginWorkflow::new(context(root.path(), None));
    let launcher = FakeLauncher::new(Behavior::LaunchFails);
    let mut process = gcloud();
    let mut prompt = ReaderPrompt::new(Cursor::new(&b"PASTED\n"[..]), Vec::new());

    let report = workflow.run(&mut process, &launcher, &mut prompt).await.unwrap();

    assert_eq!(report.origin, CodeOrigin::Manual);
    assert_eq!(report.stop, None);
    assert_eq!(report.attempts, 0);
    assert_eq!(process.written(), ["PASTED"]);
    assert!(!launcher.launches()[0].exists());
}

#[tokio::test]
async fn test_no_code_and_no_input_is_an_error() {
    let root = profiles_root();
    let workflow = LoginWorkflow::new(context(root.path(), None));
    let launcher = FakeLauncher::new(Behavior::LaunchFails);
    let mut process = gcloud();

    let err = workflow
        .run(&mut process, &launcher, &mut no_input())
        .await
        .unwrap_err();

    assert!(!err.is_fatal_discovery());
    assert!(process.written().is_empty());
}

#[tokio::test]
async fn test_successful_selector_is_cached() {
    let root = profiles_root();
    let state = TempDir::new().unwrap();
    let cache_path = state.path().join("selectors.json");
    let workflow = LoginWorkflow::new(context(root.path(), Some(cache_path.clone())));
    let launcher = FakeLauncher::new(Behavior::ConsentButton {
        selector: "#submit_approve_access",
        code: "4/consented",
    });
    let mut process = gcloud();

    let report = workflow
        .run(&mut process, &launcher, &mut no_input())
        .await
        .unwrap();

    assert_eq!(process.written(), ["4/consented"]);
    assert!(report.cache_saved);

    let cache = SelectorCache::load(&cache_path);
    assert_eq!(cache.last_working, vec!["#submit_approve_access"]);
    assert_eq!(
        cache.prioritized(&["a"]),
        vec!["#submit_approve_access", "a"]
    );
}

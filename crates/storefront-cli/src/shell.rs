//! Line-oriented command shell over the storefront core.
//!
//! Commands are parsed from a single input line and executed against a
//! `Navigator` and a `NotificationQueue`. Execution returns the lines to
//! print so the shell can be driven from tests.

use anyhow::{bail, Context, Result};
use tracing::debug;

use storefront_core::auth::{LoginCredentials, Session, StorageKey, TokenStore};
use storefront_core::notify::{NotificationQueue, Severity, ToastEntry, ToastId};
use storefront_core::router::{GuardDecision, Navigation, Navigator};

/// Username recorded for OAuth logins when none is given
const DEFAULT_OAUTH_USERNAME: &str = "oauth-user";

pub const HELP: &str = "\
Commands:
  go <url>                              navigate, e.g. go /admin or go /home#access_token=abc
  login <user> <token> [refresh] [--admin]
  oauth [user]                          finish a login started by an OAuth redirect
  logout
  session                               show the stored session
  where                                 show the current location
  toast [severity] <message>            severity: info (default), success, error
  dismiss <id>
  toasts                                list visible toasts
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go(String),
    Login {
        username: String,
        token: String,
        refresh: Option<String>,
        admin: bool,
    },
    OAuth(Option<String>),
    Logout,
    Session,
    Where,
    Toast {
        severity: Option<String>,
        message: String,
    },
    Dismiss(ToastId),
    Toasts,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name {
        "go" | "goto" | "navigate" => match args.as_slice() {
            [url] => Command::Go(url.to_string()),
            _ => bail!("usage: go <url>"),
        },
        "login" => {
            let admin = args.contains(&"--admin");
            let positional: Vec<&str> = args.iter().copied().filter(|a| *a != "--admin").collect();
            match positional.as_slice() {
                [username, token] => Command::Login {
                    username: username.to_string(),
                    token: token.to_string(),
                    refresh: None,
                    admin,
                },
                [username, token, refresh] => Command::Login {
                    username: username.to_string(),
                    token: token.to_string(),
                    refresh: Some(refresh.to_string()),
                    admin,
                },
                _ => bail!("usage: login <user> <token> [refresh] [--admin]"),
            }
        }
        "oauth" => match args.as_slice() {
            [] => Command::OAuth(None),
            [username] => Command::OAuth(Some(username.to_string())),
            _ => bail!("usage: oauth [user]"),
        },
        "logout" => Command::Logout,
        "session" | "whoami" => Command::Session,
        "where" | "pwd" => Command::Where,
        // The first word is a severity only when it names one exactly
        "toast" => match args.as_slice() {
            [severity, message @ ..]
                if !message.is_empty() && Severity::from_name(severity).is_some() =>
            {
                Command::Toast {
                    severity: Some(severity.to_string()),
                    message: message.join(" "),
                }
            }
            [] => bail!("usage: toast [severity] <message>"),
            message => Command::Toast {
                severity: None,
                message: message.join(" "),
            },
        },
        "dismiss" => match args.as_slice() {
            [id] => {
                let id = id
                    .trim_start_matches('#')
                    .parse()
                    .with_context(|| format!("invalid toast id: {}", id))?;
                Command::Dismiss(ToastId(id))
            }
            _ => bail!("usage: dismiss <id>"),
        },
        "toasts" | "ls" => Command::Toasts,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command: {} (try `help`)", other),
    };
    Ok(Some(command))
}

pub enum Outcome {
    Continue(Vec<String>),
    Quit,
}

pub struct Shell<S: TokenStore> {
    navigator: Navigator<S>,
    toasts: NotificationQueue,
}

impl<S: TokenStore> Shell<S> {
    pub fn new(navigator: Navigator<S>, toasts: NotificationQueue) -> Self {
        Self { navigator, toasts }
    }

    pub fn toasts(&self) -> &NotificationQueue {
        &self.toasts
    }

    pub fn navigator(&self) -> &Navigator<S> {
        &self.navigator
    }

    /// Run a command. Failures are reported to the user as error toasts.
    pub fn execute(&mut self, command: Command) -> Outcome {
        debug!(?command, "Executing command");
        match self.run(command) {
            Ok(outcome) => outcome,
            Err(e) => {
                let id = self.toasts.show_toast(&format!("{:#}", e), Some("error"));
                Outcome::Continue(vec![format!("error: {:#} (toast #{})", e, id)])
            }
        }
    }

    fn run(&mut self, command: Command) -> Result<Outcome> {
        let lines = match command {
            Command::Go(url) => {
                let navigation = self.navigator.navigate(&url);
                self.describe_navigation(&navigation)
            }
            Command::Login {
                username,
                token,
                refresh,
                admin,
            } => {
                let credentials = LoginCredentials {
                    access: token,
                    refresh,
                    username,
                    is_admin: admin,
                };
                Session::login(self.navigator.store_mut(), &credentials)
                    .context("Failed to save session")?;
                self.toasts.show_toast("Logged in", Some("success"));
                vec![format!("logged in as {}", credentials.username)]
            }
            Command::OAuth(username) => {
                let username = username.as_deref().unwrap_or(DEFAULT_OAUTH_USERNAME);
                let session = Session::complete_oauth_login(self.navigator.store_mut(), username)
                    .context("Failed to save session")?;
                match session {
                    Some(session) => {
                        self.toasts.show_toast("Logged in", Some("success"));
                        vec![format!(
                            "logged in as {} via OAuth",
                            session.username.unwrap_or_default()
                        )]
                    }
                    None => bail!("No OAuth login is pending"),
                }
            }
            Command::Logout => {
                Session::logout(self.navigator.store_mut()).context("Failed to clear session")?;
                self.toasts.show_toast("Logged out", Some("info"));
                vec!["logged out".to_string()]
            }
            Command::Session => describe_session(&self.navigator.session()),
            Command::Where => vec![self.navigator.current().to_string()],
            Command::Toast { severity, message } => {
                let id = self.toasts.show_toast(&message, severity.as_deref());
                vec![format!("toast #{} queued", id)]
            }
            Command::Dismiss(id) => {
                if self.toasts.dismiss(id) {
                    vec![format!("toast #{} dismissed", id)]
                } else {
                    vec![format!("toast #{} is already gone", id)]
                }
            }
            Command::Toasts => {
                let visible = self.toasts.visible();
                if visible.is_empty() {
                    vec!["no toasts".to_string()]
                } else {
                    visible.iter().map(format_toast).collect()
                }
            }
            Command::Help => HELP.lines().map(str::to_string).collect(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(lines))
    }

    fn describe_navigation(&self, navigation: &Navigation) -> Vec<String> {
        let route = navigation.route.as_deref().unwrap_or("-");
        let mut lines = match navigation.decision {
            GuardDecision::Allowed => vec![format!("-> {} [{}]", navigation.location, route)],
            decision => vec![format!(
                "-> {} [{}] redirected from {}: {}",
                navigation.location,
                route,
                navigation.requested.path,
                decision.cause().map(|c| c.to_string()).unwrap_or_default()
            )],
        };
        for (name, value) in &navigation.params {
            lines.push(format!("   {} = {}", name, value));
        }
        if self.navigator.store().get(StorageKey::OAuthHandoff).is_some() {
            lines.push("   OAuth token received, run `oauth [user]` to finish signing in".to_string());
        }
        lines
    }
}

pub fn format_toast(entry: &ToastEntry) -> String {
    format!(
        "#{} [{}] {} ({}ms)",
        entry.id, entry.severity, entry.message, entry.ttl_ms
    )
}

fn describe_session(session: &Session) -> Vec<String> {
    if !session.is_authenticated() {
        return vec!["not logged in".to_string()];
    }
    vec![
        format!("user:    {}", session.username.as_deref().unwrap_or("-")),
        format!("admin:   {}", session.is_admin),
        format!("refresh: {}", if session.refresh_token.is_some() { "yes" } else { "no" }),
    ]
}

// ============================================================================
// Tests
// ============================================================================

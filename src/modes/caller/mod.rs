/// Caller: typed client for the gateway API, an interactive shell and a
/// random load generator
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{info, warn};

use crate::error::GatewayResult;
use crate::protocol::{
    AddMnpRequest, ApiResponse, LoginRequest, PhoneNumberRequest, ADD_MNP_PATH,
    GET_LATEST_MNP_PATH, GET_MNP_HISTORY_PATH, GET_OPERATOR_PATH, LOGIN_PATH, LOGOUT_PATH,
};

/// Logins the load generator picks from; each uses itself as password
pub const LOGINS: [&str; 7] = [
    "ivan",
    "denis",
    "mikhail",
    "oleg",
    "nikita",
    "alexander",
    "vladislav",
];

/// HTTP client holding one caller's session cookie
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayClient {
    /// `base_url` like `http://127.0.0.1:8080`
    pub fn new<S: Into<String>>(base_url: S) -> GatewayResult<Self> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> GatewayResult<(StatusCode, ApiResponse)> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<ApiResponse>().await?;
        Ok((status, body))
    }

    pub async fn login(&self, login: &str, password: &str) -> GatewayResult<(StatusCode, ApiResponse)> {
        let body = LoginRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        self.post(LOGIN_PATH, Some(&body)).await
    }

    pub async fn logout(&self) -> GatewayResult<(StatusCode, ApiResponse)> {
        self.post::<()>(LOGOUT_PATH, None).await
    }

    pub async fn get_operator(&self, phone_number: &str) -> GatewayResult<(StatusCode, ApiResponse)> {
        self.post(GET_OPERATOR_PATH, Some(&phone_request(phone_number))).await
    }

    pub async fn get_latest_mnp(&self, phone_number: &str) -> GatewayResult<(StatusCode, ApiResponse)> {
        self.post(GET_LATEST_MNP_PATH, Some(&phone_request(phone_number))).await
    }

    pub async fn get_mnp_history(&self, phone_number: &str) -> GatewayResult<(StatusCode, ApiResponse)> {
        self.post(GET_MNP_HISTORY_PATH, Some(&phone_request(phone_number))).await
    }

    pub async fn add_mnp(&self, phone_number: &str, operator_name: &str) -> GatewayResult<(StatusCode, ApiResponse)> {
        let body = AddMnpRequest {
            phone_number: phone_number.to_string(),
            operator_name: operator_name.to_string(),
            session_key: None,
        };
        self.post(ADD_MNP_PATH, Some(&body)).await
    }
}

fn phone_request(phone_number: &str) -> PhoneNumberRequest {
    PhoneNumberRequest {
        phone_number: phone_number.to_string(),
        session_key: None,
    }
}

const MENU: &str = "Read command:
1 - login;
2 - get operator for phone number;
3 - get latest mnp for phone number;
4 - get mnp history for phone number;
5 - add mnp for phone number;
6 - logout;
7 - exit
";

/// One fully prompted shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login { login: String, password: String },
    GetOperator { phone_number: String },
    GetLatestMnp { phone_number: String },
    GetMnpHistory { phone_number: String },
    AddMnp { phone_number: String, operator_name: String },
    Logout,
    Exit,
    Unknown(String),
}

/// Line-driven manual caller: pick a command by number, answer its prompts,
/// see the raw status and body
pub struct InteractiveShell {
    client: GatewayClient,
}

impl InteractiveShell {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    /// Serve commands from `input` until `7` or end of input
    pub async fn run<R, W>(&self, input: R, mut output: W) -> GatewayResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(command) = read_command(&mut lines, &mut output).await? {
            let (status, body) = match command {
                ShellCommand::Exit => {
                    output.write_all(b"Client stopped\n").await?;
                    break;
                }
                ShellCommand::Unknown(choice) => {
                    output
                        .write_all(format!("Unknown command \"{}\"!\n", choice).as_bytes())
                        .await?;
                    continue;
                }
                ShellCommand::Login { login, password } => self.client.login(&login, &password).await?,
                ShellCommand::GetOperator { phone_number } => self.client.get_operator(&phone_number).await?,
                ShellCommand::GetLatestMnp { phone_number } => self.client.get_latest_mnp(&phone_number).await?,
                ShellCommand::GetMnpHistory { phone_number } => self.client.get_mnp_history(&phone_number).await?,
                ShellCommand::AddMnp {
                    phone_number,
                    operator_name,
                } => self.client.add_mnp(&phone_number, &operator_name).await?,
                ShellCommand::Logout => self.client.logout().await?,
            };

            let body = serde_json::to_string(&body).unwrap_or_default();
            output
                .write_all(format!("{}\n{}\n", status, body).as_bytes())
                .await?;
        }
        output.flush().await?;
        Ok(())
    }
}

/// Print `prompt`, then read one line; `None` at end of input
async fn ask<R, W>(lines: &mut Lines<R>, output: &mut W, prompt: &str) -> GatewayResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(prompt.as_bytes()).await?;
    output.write_all(b">>> ").await?;
    output.flush().await?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

async fn read_command<R, W>(lines: &mut Lines<R>, output: &mut W) -> GatewayResult<Option<ShellCommand>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(choice) = ask(lines, output, MENU).await? else {
        return Ok(None);
    };

    let command = match choice.as_str() {
        "1" => {
            let Some(login) = ask(lines, output, "Read login:\n").await? else {
                return Ok(None);
            };
            let Some(password) = ask(lines, output, "Read password:\n").await? else {
                return Ok(None);
            };
            ShellCommand::Login { login, password }
        }
        "2" | "3" | "4" | "5" => {
            let Some(phone_number) = ask(lines, output, "Read phone number:\n").await? else {
                return Ok(None);
            };
            match choice.as_str() {
                "2" => ShellCommand::GetOperator { phone_number },
                "3" => ShellCommand::GetLatestMnp { phone_number },
                "4" => ShellCommand::GetMnpHistory { phone_number },
                _ => {
                    let Some(operator_name) = ask(lines, output, "Read operator name:\n").await? else {
                        return Ok(None);
                    };
                    ShellCommand::AddMnp {
                        phone_number,
                        operator_name,
                    }
                }
            }
        }
        "6" => ShellCommand::Logout,
        "7" => ShellCommand::Exit,
        _ => ShellCommand::Unknown(choice),
    };
    Ok(Some(command))
}

/// Operation a generated caller issues on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOp {
    GetOperator,
    GetLatestMnp,
    GetMnpHistory,
    AddMnp,
}

impl CallerOp {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..4) {
            0 => CallerOp::GetOperator,
            1 => CallerOp::GetLatestMnp,
            2 => CallerOp::GetMnpHistory,
            _ => CallerOp::AddMnp,
        }
    }
}

/// Spawns concurrent callers that log in and issue random operations
#[derive(Debug, Clone)]
pub struct LoadGenerator {
    pub gateway_url: String,
    pub sessions: usize,
    pub interval: Duration,
    /// Stop each caller after this many operations; run forever when `None`
    pub iterations: Option<u64>,
    pub phone_number: String,
    pub operator_name: String,
}

impl LoadGenerator {
    pub fn new<S: Into<String>>(gateway_url: S) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            sessions: 1,
            interval: Duration::from_secs(2),
            iterations: None,
            phone_number: "89999734509".to_string(),
            operator_name: "Yota".to_string(),
        }
    }

    /// Run all callers to completion; returns the number of failed operations
    pub async fn run(&self) -> GatewayResult<u64> {
        let mut callers = Vec::with_capacity(self.sessions);
        for id in 0..self.sessions {
            let client = GatewayClient::new(self.gateway_url.clone())?;
            let this = self.clone();
            callers.push(tokio::spawn(async move { this.run_caller(id, client).await }));
        }

        let mut failures = 0;
        for result in futures::future::join_all(callers).await {
            match result {
                Ok(Ok(n)) => failures += n,
                Ok(Err(e)) => {
                    warn!(error = %e, "caller stopped");
                    failures += 1;
                }
                Err(e) => {
                    warn!(error = %e, "caller task panicked");
                    failures += 1;
                }
            }
        }
        Ok(failures)
    }

    async fn run_caller(&self, id: usize, client: GatewayClient) -> GatewayResult<u64> {
        let login = {
            let mut rng = rand::thread_rng();
            LOGINS.choose(&mut rng).copied().unwrap_or("ivan")
        };

        info!(caller = id, login, "trying to login");
        let (status, body) = client.login(login, login).await?;
        if !body.is_ok() {
            warn!(caller = id, %status, description = ?body.description, "login failed");
            return Ok(1);
        }
        info!(caller = id, "successfully logged in");

        let mut failures = 0;
        let mut done = 0u64;
        while self.iterations.map_or(true, |n| done < n) {
            let op = CallerOp::random(&mut rand::thread_rng());
            let (status, body) = match op {
                CallerOp::GetOperator => client.get_operator(&self.phone_number).await?,
                CallerOp::GetLatestMnp => client.get_latest_mnp(&self.phone_number).await?,
                CallerOp::GetMnpHistory => client.get_mnp_history(&self.phone_number).await?,
                CallerOp::AddMnp => client.add_mnp(&self.phone_number, &self.operator_name).await?,
            };

            if body.is_ok() {
                info!(caller = id, ?op, data = ?body.data, "got response");
            } else {
                warn!(caller = id, ?op, %status, description = ?body.description, "operation failed");
                failures += 1;
            }

            done += 1;
            tokio::time::sleep(self.interval).await;
        }

        client.logout().await?;
        Ok(failures)
    }
}

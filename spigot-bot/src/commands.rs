//! Chat command handling.
//!
//! Slash commands are answered directly; any other text is a claim and goes
//! to the [`RequestRouter`].

use std::sync::Arc;

use spigot::gate::parse_address;
use spigot::timestamp::humanize;
use spigot::{ChainClient, RequestRouter, RequesterIdentity, UnixTimestamp};

const UNAVAILABLE: &str = "The network is not responding right now. Please try again later.";

/// A parsed chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/balance <address>`
    Balance(Option<&'a str>),
    /// `/nft <address>`
    Nft(Option<&'a str>),
    /// `/status`
    Status,
    /// Any other slash command.
    Unknown(&'a str),
    /// Plain text, treated as a claim address.
    Claim(&'a str),
}

impl<'a> Command<'a> {
    /// Parses `text`. A `@botname` suffix on the command is ignored.
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Self::Claim(text);
        };
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        let name = name.split_once('@').map_or(name, |(name, _)| name);
        let arg = words.next();
        match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "balance" => Self::Balance(arg),
            "nft" => Self::Nft(arg),
            "status" => Self::Status,
            other => Self::Unknown(other),
        }
    }
}

/// Reply to one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Plain-text reply.
    pub text: String,
    /// Claim outcome label, or `"command"` for slash commands.
    pub outcome: &'static str,
}

impl Reply {
    fn command(text: String) -> Self {
        Self {
            text,
            outcome: "command",
        }
    }
}

/// Answers chat messages for one faucet.
#[derive(Debug)]
pub struct CommandHandler<C> {
    router: Arc<RequestRouter<C>>,
}

impl<C> Clone for CommandHandler<C> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
        }
    }
}

impl<C: ChainClient> CommandHandler<C> {
    /// Creates a handler around `router`.
    pub const fn new(router: Arc<RequestRouter<C>>) -> Self {
        Self { router }
    }

    /// The claim router.
    #[must_use]
    pub const fn router(&self) -> &Arc<RequestRouter<C>> {
        &self.router
    }

    /// Answers `text` from `identity`. `name` personalises `/start`.
    pub async fn handle(
        &self,
        identity: Option<RequesterIdentity>,
        name: Option<&str>,
        text: &str,
    ) -> Reply {
        match Command::parse(text) {
            Command::Start => Reply::command(self.start(name)),
            Command::Help => Reply::command(self.help()),
            Command::Balance(arg) => Reply::command(self.balance(arg).await),
            Command::Nft(arg) => Reply::command(self.nft(arg).await),
            Command::Status => Reply::command(self.status().await),
            Command::Unknown(name) => Reply::command(format!(
                "Unknown command /{name}.\n/help shows what I can do."
            )),
            Command::Claim(address) => {
                let outcome = self.router.handle_claim(identity, address).await;
                Reply {
                    text: self.router.reply(&outcome, UnixTimestamp::now()),
                    outcome: outcome.label(),
                }
            }
        }
    }

    fn start(&self, name: Option<&str>) -> String {
        let symbol = &self.router.grant().symbol;
        let greeting = name.map_or_else(|| "Hi!".to_owned(), |name| format!("Hi {name}!"));
        format!(
            "{greeting}\nWelcome to the {symbol} faucet!\n\n\
             To receive {symbol}, simply send me your address as a message.\n\n\
             /help shows what I can do."
        )
    }

    fn help(&self) -> String {
        let grant = self.router.grant();
        let ledger = self.router.ledger();
        let mut text = format!(
            "The following commands are available:\n\n\
             /start - Start the bot\n\
             Send your address as a message to receive {grant} \
             (up to {} per {}).\n\
             /balance <address> - Check a {} balance\n",
            ledger.limit(),
            humanize(ledger.window()),
            grant.symbol,
        );
        if self.router.gate().nft_contract().is_some() {
            let club = self.club();
            text.push_str(&format!("/nft <address> - Check a {club} NFT balance\n"));
        }
        text.push_str("/status - Show the faucet address and balance\n/help - Display this help message");
        text
    }

    async fn balance(&self, arg: Option<&str>) -> String {
        let Some(address) = arg.and_then(|a| parse_address(a).ok()) else {
            return usage("balance");
        };
        let grant = self.router.grant();
        match self.router.disburser().balance_of(address, grant.kind).await {
            Ok(balance) => format!("{address} balance: {}", grant.display_amount(balance)),
            Err(e) => {
                tracing::warn!(%address, error = %e, "Balance query failed");
                UNAVAILABLE.to_owned()
            }
        }
    }

    async fn nft(&self, arg: Option<&str>) -> String {
        if self.router.gate().nft_contract().is_none() {
            return "This faucet has no NFT club.".to_owned();
        }
        let Some(address) = arg.and_then(|a| parse_address(a).ok()) else {
            return usage("nft");
        };
        match self.router.gate().nft_balance(address).await {
            Ok(Some(count)) => format!("{address} {} balance: {count}", self.club()),
            Ok(None) => "This faucet has no NFT club.".to_owned(),
            Err(e) => {
                tracing::warn!(%address, error = %e, "NFT balance query failed");
                UNAVAILABLE.to_owned()
            }
        }
    }

    async fn status(&self) -> String {
        let grant = self.router.grant();
        let disburser = self.router.disburser();
        let faucet = disburser.address();
        let ledger = self.router.ledger();
        let balance = match disburser.balance_of(faucet, grant.kind).await {
            Ok(balance) => grant.display_amount(balance),
            Err(e) => {
                tracing::warn!(error = %e, "Faucet balance query failed");
                "unavailable".to_owned()
            }
        };
        format!(
            "Faucet address: {faucet}\nBalance: {balance}\nGrant: {grant}, {} per {}",
            ledger.limit(),
            humanize(ledger.window()),
        )
    }

    fn club(&self) -> &str {
        self.router.config().nft_symbol.as_deref().unwrap_or("NFT")
    }
}

fn usage(command: &str) -> String {
    format!(
        "Please provide a valid address.\nformat: /{command} 0xfc3e5C537bC66D283E8648A109d75F27b1DEc1E4"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("  /help@SpigotBot "), Command::Help);
        assert_eq!(Command::parse("/balance 0xabc"), Command::Balance(Some("0xabc")));
        assert_eq!(Command::parse("/balance"), Command::Balance(None));
        assert_eq!(Command::parse("/nft 0xabc extra"), Command::Nft(Some("0xabc")));
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(Command::parse("/withdraw"), Command::Unknown("withdraw"));
        assert_eq!(Command::parse("/"), Command::Unknown(""));
    }

    #[test]
    fn test_plain_text_is_claim() {
        assert_eq!(
            Command::parse(" 0x1111111111111111111111111111111111111111\n"),
            Command::Claim("0x1111111111111111111111111111111111111111")
        );
        assert_eq!(Command::parse("not-an-address"), Command::Claim("not-an-address"));
    }

    #[test]
    fn test_usage_names_command() {
        assert!(usage("nft").contains("/nft 0x"));
    }
}

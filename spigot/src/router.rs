//! Claim request lifecycle.
//!
//! [`RequestRouter`] drives a claim through
//! `Validating → CheckingEligibility → Reserving → Disbursing →
//! Committing | RollingBack → Done` and renders the [`ClaimOutcome`] as a chat
//! reply.
//!
//! Once a claim reaches `Disbursing`, the send and the ledger commit or
//! rollback run on a task owned by the router's [`TaskTracker`]. Dropping the
//! caller's future does not cancel it, and [`RequestRouter::drain`] waits for
//! every such task during shutdown.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use alloy_primitives::{Address, TxHash};
use tokio_util::task::TaskTracker;

use crate::asset::{DisbursementRequest, Grant, RequesterIdentity, TransactionReceipt};
use crate::chain::ChainClient;
use crate::disburser::{DisburseError, Disburser};
use crate::gate::{Eligibility, EligibilityGate, IneligibleReason, parse_address};
use crate::ledger::{ClaimLedger, ReserveOutcome};
use crate::timestamp::{UnixTimestamp, humanize};

/// Where a claim currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStage {
    /// Checking that an identity is present and the text is an address.
    Validating,
    /// Running the eligibility gate.
    CheckingEligibility,
    /// Taking a ledger slot.
    Reserving,
    /// Sending the transfer.
    Disbursing,
    /// Making the ledger slot permanent.
    Committing,
    /// Releasing the ledger slot.
    RollingBack,
    /// Finished.
    Done,
}

impl Display for ClaimStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::CheckingEligibility => "checking_eligibility",
            Self::Reserving => "reserving",
            Self::Disbursing => "disbursing",
            Self::Committing => "committing",
            Self::RollingBack => "rolling_back",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Final result of a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// No identity, or the text is not an address.
    InvalidInput,
    /// The gate refused the address.
    Ineligible(IneligibleReason),
    /// The identity is at its claim limit.
    RateLimited {
        /// Earliest time a new claim can succeed.
        next_eligible_at: UnixTimestamp,
    },
    /// An infrastructure failure; the claim was rolled back and may be retried.
    TransientError {
        /// Hash of a transaction that was broadcast but not confirmed.
        tx_hash: Option<TxHash>,
    },
    /// The grant was sent.
    Success {
        /// Recipient.
        destination: Address,
        /// Broadcast transaction.
        receipt: TransactionReceipt,
    },
    /// The transfer failed for a non-transient reason; the claim was rolled back.
    Failure(DisburseError),
}

impl ClaimOutcome {
    /// Short machine-readable label, used in logs and gateway responses.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Ineligible(_) => "ineligible",
            Self::RateLimited { .. } => "rate_limited",
            Self::TransientError { .. } => "transient_error",
            Self::Success { .. } => "success",
            Self::Failure(_) => "failure",
        }
    }
}

/// What the router hands out and how it describes club membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// The per-claim grant.
    pub grant: Grant,
    /// Symbol of the NFT club, shown when a claim is refused for membership.
    pub nft_symbol: Option<String>,
    /// Extra line telling users how to join the club.
    pub membership_hint: Option<String>,
}

#[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
fn enter(identity: Option<RequesterIdentity>, stage: ClaimStage) {
    #[cfg(feature = "telemetry")]
    tracing::debug!(identity = ?identity, %stage, "claim stage");
}

/// Runs claims against a shared ledger and disburser.
#[derive(Debug)]
pub struct RequestRouter<C> {
    ledger: Arc<ClaimLedger>,
    gate: EligibilityGate<C>,
    disburser: Arc<Disburser<C>>,
    config: RouterConfig,
    tracker: TaskTracker,
}

impl<C: ChainClient> RequestRouter<C> {
    /// Creates a router.
    pub fn new(
        ledger: Arc<ClaimLedger>,
        gate: EligibilityGate<C>,
        disburser: Arc<Disburser<C>>,
        config: RouterConfig,
    ) -> Self {
        Self {
            ledger,
            gate,
            disburser,
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// The claim ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<ClaimLedger> {
        &self.ledger
    }

    /// The eligibility gate.
    #[must_use]
    pub const fn gate(&self) -> &EligibilityGate<C> {
        &self.gate
    }

    /// The disburser.
    #[must_use]
    pub const fn disburser(&self) -> &Arc<Disburser<C>> {
        &self.disburser
    }

    /// The per-claim grant.
    #[must_use]
    pub const fn grant(&self) -> &Grant {
        &self.config.grant
    }

    /// Grant and membership settings.
    #[must_use]
    pub const fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Handles a claim made now.
    pub async fn handle_claim(
        &self,
        identity: Option<RequesterIdentity>,
        text: &str,
    ) -> ClaimOutcome {
        self.handle_claim_at(identity, text, UnixTimestamp::now())
            .await
    }

    /// Handles a claim as if made at `now`.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(skip(self, text), fields(outcome = tracing::field::Empty))
    )]
    pub async fn handle_claim_at(
        &self,
        identity: Option<RequesterIdentity>,
        text: &str,
        now: UnixTimestamp,
    ) -> ClaimOutcome {
        let outcome = self.run(identity, text, now).await;
        enter(identity, ClaimStage::Done);
        #[cfg(feature = "telemetry")]
        tracing::Span::current().record("outcome", outcome.label());
        outcome
    }

    async fn run(
        &self,
        identity: Option<RequesterIdentity>,
        text: &str,
        now: UnixTimestamp,
    ) -> ClaimOutcome {
        enter(identity, ClaimStage::Validating);
        let Some(identity) = identity else {
            return ClaimOutcome::InvalidInput;
        };
        if parse_address(text).is_err() {
            return ClaimOutcome::InvalidInput;
        }

        enter(Some(identity), ClaimStage::CheckingEligibility);
        let destination = match self.gate.check(text, self.config.grant.kind).await {
            Ok(Eligibility::Eligible(address)) => address,
            Ok(Eligibility::Ineligible(reason)) => return ClaimOutcome::Ineligible(reason),
            Err(_e) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(%identity, error = %_e, "eligibility check failed");
                return ClaimOutcome::TransientError { tx_hash: None };
            }
        };

        enter(Some(identity), ClaimStage::Reserving);
        let reservation = match self.ledger.try_reserve(identity, now) {
            ReserveOutcome::Reserved(reservation) => reservation,
            ReserveOutcome::Denied { next_eligible_at } => {
                return ClaimOutcome::RateLimited { next_eligible_at };
            }
        };

        enter(Some(identity), ClaimStage::Disbursing);
        let request = DisbursementRequest {
            destination,
            amount: self.config.grant.amount,
            kind: self.config.grant.kind,
        };
        let ledger = Arc::clone(&self.ledger);
        let disburser = Arc::clone(&self.disburser);
        let task = self.tracker.spawn(async move {
            match disburser.send(request).await {
                Ok(receipt) => {
                    enter(Some(identity), ClaimStage::Committing);
                    ledger.commit(&reservation);
                    ClaimOutcome::Success {
                        destination,
                        receipt,
                    }
                }
                Err(e) => {
                    enter(Some(identity), ClaimStage::RollingBack);
                    ledger.rollback(&reservation);
                    match e {
                        DisburseError::RpcUnavailable { tx_hash, .. } => {
                            ClaimOutcome::TransientError { tx_hash }
                        }
                        other => ClaimOutcome::Failure(other),
                    }
                }
            }
        });

        task.await.unwrap_or_else(|_join_error| {
            #[cfg(feature = "telemetry")]
            tracing::error!(%identity, error = %_join_error, "disbursement task failed");
            self.ledger.rollback(&reservation);
            ClaimOutcome::TransientError { tx_hash: None }
        })
    }

    /// Renders `outcome` as a plain-text chat reply. `now` is used for the
    /// time remaining on rate-limited claims.
    #[must_use]
    pub fn reply(&self, outcome: &ClaimOutcome, now: UnixTimestamp) -> String {
        let grant = &self.config.grant;
        match outcome {
            ClaimOutcome::InvalidInput => format!(
                "Please send a valid address to claim {}.\n/help shows what I can do.",
                grant.symbol
            ),
            ClaimOutcome::Ineligible(IneligibleReason::BadAddress) => {
                "That address cannot receive grants. Please send a different address.".to_owned()
            }
            ClaimOutcome::Ineligible(IneligibleReason::FaucetAddress) => {
                "That is the faucet's own address. Please send your wallet address.".to_owned()
            }
            ClaimOutcome::Ineligible(IneligibleReason::NotMember) => {
                let club = self.config.nft_symbol.as_deref().unwrap_or("NFT");
                let mut reply = format!("Sorry, you are not a member of the {club} club.");
                if let Some(hint) = &self.config.membership_hint {
                    reply.push_str("\n\n");
                    reply.push_str(hint);
                }
                reply
            }
            ClaimOutcome::RateLimited { next_eligible_at } => format!(
                "Sorry, you have reached the maximum number of claims ({}) within the past {}. \
                 Please try again in {}.",
                self.ledger.limit(),
                humanize(self.ledger.window()),
                humanize(next_eligible_at.saturating_duration_since(now)),
            ),
            ClaimOutcome::TransientError { tx_hash: None } => {
                "The network is not responding right now. Please try again later.".to_owned()
            }
            ClaimOutcome::TransientError {
                tx_hash: Some(hash),
            } => format!(
                "Transaction {hash} was submitted but not confirmed in time. \
                 It may still land, so check it before claiming again."
            ),
            ClaimOutcome::Success {
                destination,
                receipt,
            } => format!(
                "{grant} sent to: {destination}\nTransaction hash: {}",
                receipt.transaction_hash
            ),
            ClaimOutcome::Failure(DisburseError::InsufficientFunds(_)) => {
                "The faucet is empty right now. Please try again later.".to_owned()
            }
            ClaimOutcome::Failure(_) => {
                "The transfer could not be made. Please try again later.".to_owned()
            }
        }
    }

    /// Stops accepting tracked work and waits for in-flight disbursements.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Number of disbursements currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use alloy_primitives::{U256, address};

    use super::*;
    use crate::asset::AssetKind;
    use crate::chain::ChainError;
    use crate::disburser::DisburserConfig;
    use crate::mock::{DEV_KEY, MockChain};
    use crate::signer::SignerAccount;

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000cc");
    const NFT: Address = address!("0x00000000000000000000000000000000000000aa");
    const ALICE: Address = address!("0x1111111111111111111111111111111111111111");
    const DAY: Duration = Duration::from_secs(86_400);
    const HOUR: Duration = Duration::from_secs(3_600);
    const T0: UnixTimestamp = UnixTimestamp::from_secs(1_700_000_000);

    fn router(kind: AssetKind, nft: Option<Address>) -> (RequestRouter<MockChain>, Arc<MockChain>) {
        let client = Arc::new(MockChain::new(0));
        let signer = SignerAccount::from_private_key(DEV_KEY).unwrap();
        let faucet = signer.address();
        client.set_token_balance(TOKEN, faucet, U256::from(10u64.pow(15)));
        let token_contract = (kind == AssetKind::FungibleToken).then_some(TOKEN);
        let disburser = Disburser::new(
            Arc::clone(&client),
            signer,
            DisburserConfig {
                token_contract,
                ..DisburserConfig::new(31_337)
            },
        );
        let gate = EligibilityGate::new(Arc::clone(&client), faucet, nft, Duration::from_secs(5));
        let ledger = Arc::new(ClaimLedger::new(NonZeroU32::MIN, DAY));
        let config = RouterConfig {
            grant: Grant {
                kind,
                amount: U256::from(500_000_000_000u64),
                decimals: 9,
                symbol: "TTK".into(),
            },
            nft_symbol: Some("JNC".into()),
            membership_hint: None,
        };
        (
            RequestRouter::new(ledger, gate, Arc::new(disburser), config),
            client,
        )
    }

    fn alice() -> String {
        ALICE.to_string()
    }

    #[tokio::test]
    async fn test_not_an_address_is_invalid_input() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        let outcome = router
            .handle_claim_at(Some(RequesterIdentity(1)), "not-an-address", T0)
            .await;
        assert_eq!(outcome, ClaimOutcome::InvalidInput);
        assert_eq!(router.ledger().tracked_identities(), 0);
        assert_eq!(chain.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_identity_is_invalid_input() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        let outcome = router.handle_claim_at(None, &alice(), T0).await;
        assert_eq!(outcome, ClaimOutcome::InvalidInput);
        assert_eq!(chain.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_commits_claim() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        let identity = RequesterIdentity(7);
        let outcome = router.handle_claim_at(Some(identity), &alice(), T0).await;
        let ClaimOutcome::Success {
            destination,
            receipt,
        } = &outcome
        else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(*destination, ALICE);
        assert_eq!(router.ledger().committed_in_window(identity, T0), 1);
        assert_eq!(chain.sent_nonces(), vec![0]);

        let reply = router.reply(&outcome, T0);
        assert!(reply.starts_with("500 TTK sent to: "));
        assert!(reply.contains(&receipt.transaction_hash.to_string()));
    }

    #[tokio::test]
    async fn test_daily_limit_scenario() {
        let (router, _) = router(AssetKind::NativeCoin, None);
        let identity = RequesterIdentity(8);
        assert!(matches!(
            router.handle_claim_at(Some(identity), &alice(), T0).await,
            ClaimOutcome::Success { .. }
        ));

        let denied = router
            .handle_claim_at(Some(identity), &alice(), T0 + HOUR)
            .await;
        assert_eq!(
            denied,
            ClaimOutcome::RateLimited {
                next_eligible_at: T0 + DAY
            }
        );
        assert_eq!(
            router.reply(&denied, T0 + HOUR),
            "Sorry, you have reached the maximum number of claims (1) within the past 1d. \
             Please try again in 23h."
        );

        assert!(matches!(
            router
                .handle_claim_at(Some(identity), &alice(), T0 + DAY + HOUR)
                .await,
            ClaimOutcome::Success { .. }
        ));
    }

    #[tokio::test]
    async fn test_not_member_makes_no_reservation() {
        let (router, chain) = router(AssetKind::FungibleToken, Some(NFT));
        let identity = RequesterIdentity(9);
        let outcome = router.handle_claim_at(Some(identity), &alice(), T0).await;
        assert_eq!(
            outcome,
            ClaimOutcome::Ineligible(IneligibleReason::NotMember)
        );
        assert_eq!(router.ledger().claims_in_window(identity, T0), 0);
        assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
        assert_eq!(
            router.reply(&outcome, T0),
            "Sorry, you are not a member of the JNC club."
        );
    }

    #[tokio::test]
    async fn test_member_receives_tokens() {
        let (router, chain) = router(AssetKind::FungibleToken, Some(NFT));
        chain.set_token_balance(NFT, ALICE, U256::from(1u8));
        let outcome = router
            .handle_claim_at(Some(RequesterIdentity(10)), &alice(), T0)
            .await;
        assert!(matches!(outcome, ClaimOutcome::Success { .. }));
        assert_eq!(chain.sent.lock().unwrap()[0].to, TOKEN);
    }

    #[tokio::test]
    async fn test_gate_failure_is_transient() {
        let (router, chain) = router(AssetKind::FungibleToken, Some(NFT));
        chain.fail_next_call(ChainError::Timeout(Duration::from_secs(5)));
        let identity = RequesterIdentity(11);
        let outcome = router.handle_claim_at(Some(identity), &alice(), T0).await;
        assert_eq!(outcome, ClaimOutcome::TransientError { tx_hash: None });
        assert_eq!(router.ledger().tracked_identities(), 0);
    }

    #[tokio::test]
    async fn test_rpc_unavailable_rolls_back_and_retry_succeeds() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        let identity = RequesterIdentity(12);
        chain.fail_next_send(ChainError::Unavailable("connection refused".into()));

        let outcome = router.handle_claim_at(Some(identity), &alice(), T0).await;
        assert_eq!(outcome, ClaimOutcome::TransientError { tx_hash: None });
        assert_eq!(router.ledger().claims_in_window(identity, T0), 0);

        let retry = router.handle_claim_at(Some(identity), &alice(), T0).await;
        assert!(matches!(retry, ClaimOutcome::Success { .. }));
        assert_eq!(router.ledger().committed_in_window(identity, T0), 1);
    }

    #[tokio::test]
    async fn test_empty_faucet_is_failure() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        *chain.native_balance.lock().unwrap() = U256::ZERO;
        let identity = RequesterIdentity(13);
        let outcome = router.handle_claim_at(Some(identity), &alice(), T0).await;
        assert!(matches!(
            outcome,
            ClaimOutcome::Failure(DisburseError::InsufficientFunds(_))
        ));
        assert_eq!(router.ledger().claims_in_window(identity, T0), 0);
        assert_eq!(
            router.reply(&outcome, T0),
            "The faucet is empty right now. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_faucet_address_is_refused() {
        let (router, _) = router(AssetKind::NativeCoin, None);
        let faucet = router.disburser().address().to_string();
        let outcome = router
            .handle_claim_at(Some(RequesterIdentity(14)), &faucet, T0)
            .await;
        assert_eq!(
            outcome,
            ClaimOutcome::Ineligible(IneligibleReason::FaucetAddress)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_cancel_disbursement() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        *chain.send_delay.lock().unwrap() = Duration::from_secs(10);
        let identity = RequesterIdentity(15);
        let text = alice();

        let claim = router.handle_claim_at(Some(identity), &text, T0);
        assert!(tokio::time::timeout(Duration::from_secs(1), claim).await.is_err());
        assert_eq!(router.in_flight(), 1);

        router.drain().await;
        assert_eq!(chain.sent_nonces(), vec![0]);
        assert_eq!(router.ledger().committed_in_window(identity, T0), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_send_times_out_and_rolls_back() {
        let (router, chain) = router(AssetKind::NativeCoin, None);
        *chain.send_delay.lock().unwrap() = Duration::from_secs(60);
        let identity = RequesterIdentity(16);
        let text = alice();

        let outcome = router.handle_claim_at(Some(identity), &text, T0).await;
        assert_eq!(outcome, ClaimOutcome::TransientError { tx_hash: None });
        assert_eq!(router.ledger().claims_in_window(identity, T0), 0);
        assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
        assert!(chain.sent_nonces().is_empty());

        // The slot is free again once the node recovers.
        *chain.send_delay.lock().unwrap() = Duration::ZERO;
        let retry = router.handle_claim_at(Some(identity), &text, T0).await;
        assert!(matches!(retry, ClaimOutcome::Success { .. }));
        assert_eq!(chain.sent_nonces(), vec![0]);
    }
}

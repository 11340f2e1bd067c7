pub mod bilibili;
pub mod mock;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::model::{Account, InboundMessage, MessageCategory, Target, TargetContext};

/// The logged-in identity behind an account's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub uid: u64,
    pub name: String,
}

/// The remote platform. Every call is a fallible network round trip.
///
/// Implementations must only use the credential of the account passed in.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Check the account's credential and return who it belongs to.
    async fn verify(&self, account: &Account) -> Result<Profile, PlatformError>;

    /// Text and author of a target, fed to the comment generator.
    async fn fetch_context(
        &self,
        account: &Account,
        target: &Target,
    ) -> Result<TargetContext, PlatformError>;

    /// Follow the target's author.
    async fn follow(&self, account: &Account, target: &Target) -> Result<(), PlatformError>;

    async fn like(&self, account: &Account, target: &Target) -> Result<(), PlatformError>;

    async fn comment(
        &self,
        account: &Account,
        target: &Target,
        text: &str,
    ) -> Result<(), PlatformError>;

    async fn repost(
        &self,
        account: &Account,
        target: &Target,
        text: &str,
    ) -> Result<(), PlatformError>;

    async fn list_messages(
        &self,
        account: &Account,
        category: MessageCategory,
    ) -> Result<Vec<InboundMessage>, PlatformError>;
}

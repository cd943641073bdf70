//! External importers - OAuth-sourced item creation
//!
//! Adapters that turn provider payloads (already fetched and token-exchanged
//! by the outer platform; that plumbing is opaque to this core) into
//! portfolio items through the normal store path. One item per
//! (user, provider reference): re-imports return the existing item.

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::{CreateItemInput, ItemQuery, ItemRow, PortfolioDb};
use crate::error::PortfolioError;
use crate::model::{ItemStatus, ProviderMetadata, Visibility};
use crate::services::item_service::ItemService;
use crate::skills;

/// Importer feeding the portfolio item store
pub struct Importer {
    db: Arc<PortfolioDb>,
    items: Arc<ItemService>,
}

impl Importer {
    /// Create a new importer
    pub fn new(db: Arc<PortfolioDb>, items: Arc<ItemService>) -> Self {
        Self { db, items }
    }

    /// Import a provider payload as a draft portfolio item.
    ///
    /// Idempotent per (user, provider reference).
    pub fn import(
        &self,
        user_id: &str,
        provider: ProviderMetadata,
    ) -> Result<ItemRow, PortfolioError> {
        if user_id.is_empty() {
            return Err(PortfolioError::InvalidInput("user_id is required".into()));
        }

        if let Some(existing) = self.find_existing(user_id, &provider)? {
            debug!(
                user = %user_id,
                reference = %provider.external_ref(),
                item = %existing.id,
                "Provider reference already imported"
            );
            return Ok(existing);
        }

        let (title, summary, extracted) = describe(&provider);

        let item = self.items.create(CreateItemInput {
            id: None,
            user_id: user_id.to_string(),
            title,
            summary,
            item_type: provider.item_type(),
            mission_id: None,
            provider: Some(provider.clone()),
            competencies: Default::default(),
            evidence: vec![],
            status: ItemStatus::Draft,
            visibility: Visibility::Private,
            skills: extracted,
        })?;

        info!(
            user = %user_id,
            reference = %provider.external_ref(),
            item = %item.id,
            "Imported external work"
        );

        Ok(item)
    }

    /// Find a previously imported item for the same provider reference
    fn find_existing(
        &self,
        user_id: &str,
        provider: &ProviderMetadata,
    ) -> Result<Option<ItemRow>, PortfolioError> {
        let existing = self.db.with_conn(|conn| {
            crate::db::items::list_items(
                conn,
                &ItemQuery {
                    user_id: Some(user_id.to_string()),
                    item_type: Some(provider.item_type()),
                    limit: u32::MAX,
                    ..Default::default()
                },
            )
        })?;

        Ok(existing.into_iter().find(|item| {
            item.provider()
                .map(|p| p.external_ref() == provider.external_ref())
                .unwrap_or(false)
        }))
    }
}

/// Title, summary and skill tags for a provider payload
fn describe(provider: &ProviderMetadata) -> (String, Option<String>, Vec<String>) {
    match provider {
        ProviderMetadata::Github {
            repo,
            description,
            languages,
            topics,
            ..
        } => {
            let text = format!("{} {}", description.as_deref().unwrap_or(""), topics.join(" "));
            let extracted = skills::extract_skills(&text, &[], languages);
            (repo.clone(), description.clone(), extracted)
        }
        ProviderMetadata::Tryhackme {
            username,
            rooms_completed,
            badges,
            ..
        } => {
            let extracted = skills::extract_skills(&badges.join(" "), &[], badges);
            (
                format!("TryHackMe profile: {}", username),
                Some(format!("{} rooms completed", rooms_completed)),
                extracted,
            )
        }
        ProviderMetadata::External {
            source, reference, ..
        } => (
            format!("{}: {}", source, reference),
            None,
            vec![],
        ),
    }
}

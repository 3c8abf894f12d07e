use crate::error::RemoteServiceError;
use crate::model::{
    CreatedTopic, DISPLAY_NAME, DeleteOutcome, Message, Protocol, SubscriptionReceipt, TopicRecord,
};
use crate::service::NotificationService;

/// Placeholder the service returns instead of an ARN for unconfirmed subscriptions.
const PENDING_CONFIRMATION: &str = "pending confirmation";

/// Issues notification calls over a single service handle.
pub struct Notifier<S> {
    service: S,
}

impl<S: NotificationService> Notifier<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn publish(&self, message: &Message) -> Result<Option<String>, RemoteServiceError> {
        tracing::info!(topic_arn = %message.topic_arn, "Publishing message to topic");
        let message_id = self
            .service
            .publish(&message.topic_arn, &message.subject, &message.body)
            .await?;
        tracing::info!(topic_arn = %message.topic_arn, message_id = ?message_id, "Message published");
        Ok(message_id)
    }

    pub async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: Protocol,
        endpoint: &str,
    ) -> Result<SubscriptionReceipt, RemoteServiceError> {
        tracing::info!(topic_arn, %protocol, endpoint, "Subscribing endpoint to topic");
        let subscription_arn = self
            .service
            .subscribe(topic_arn, protocol.as_str(), endpoint)
            .await?
            .filter(|arn| !arn.is_empty() && !arn.eq_ignore_ascii_case(PENDING_CONFIRMATION));

        let receipt = SubscriptionReceipt {
            topic_arn: topic_arn.to_string(),
            protocol,
            endpoint: endpoint.to_string(),
            subscription_arn,
        };
        if receipt.is_pending() && protocol.requires_confirmation() {
            tracing::info!(endpoint, "Subscription pending: the endpoint owner must confirm it");
        }
        Ok(receipt)
    }

    /// Starts a topic listing from the first page.
    pub fn topics(&self) -> TopicPager<'_, S> {
        TopicPager::resume(&self.service, None)
    }

    /// Walks every page of the listing.
    pub async fn list_topics(&self) -> Result<Vec<TopicRecord>, RemoteServiceError> {
        tracing::info!("Retrieving all topics");
        let mut pager = self.topics();
        let mut records = Vec::new();
        while let Some(page) = pager.next_page().await? {
            records.extend(page);
        }
        Ok(records)
    }

    pub async fn create_topic(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<CreatedTopic, RemoteServiceError> {
        tracing::info!(name, "Creating topic");
        let topic_arn = self.service.create_topic(name).await?;

        tracing::info!(topic_arn = %topic_arn, display_name, "Setting topic attributes");
        match self
            .service
            .set_topic_attribute(&topic_arn, DISPLAY_NAME, display_name)
            .await
        {
            Ok(()) => Ok(CreatedTopic {
                topic_arn,
                display_name: Some(display_name.to_string()),
                attribute_error: None,
            }),
            Err(e) => {
                tracing::warn!(
                    topic_arn = %topic_arn,
                    error = %e,
                    "Topic created but its display name could not be set"
                );
                Ok(CreatedTopic {
                    topic_arn,
                    display_name: None,
                    attribute_error: Some(e),
                })
            }
        }
    }

    pub async fn delete_topic(&self, topic_arn: &str) -> Result<DeleteOutcome, RemoteServiceError> {
        tracing::info!(topic_arn, "Deleting topic");
        match self.service.delete_topic(topic_arn).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_not_found() => {
                tracing::warn!(topic_arn, request_id = ?e.request_id, "Topic already deleted");
                Ok(DeleteOutcome::AlreadyDeleted)
            }
            Err(e) => Err(e),
        }
    }
}

/// Lazy walk over the topic listing.
///
/// Each page is followed by one attribute fetch per topic. A failed fetch
/// keeps the current token, so calling [`TopicPager::next_page`] again
/// retries the same page.
pub struct TopicPager<'a, S> {
    service: &'a S,
    next_token: Option<String>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a, S: NotificationService> TopicPager<'a, S> {
    /// Continues a listing from a token handed out by an earlier walk.
    pub fn resume(service: &'a S, token: Option<String>) -> Self {
        Self {
            service,
            next_token: token.filter(|t| !t.is_empty()),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Token of the page the next call will fetch.
    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<TopicRecord>>, RemoteServiceError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.service.list_topics(self.next_token.clone()).await?;
        let mut records = Vec::with_capacity(page.topic_arns.len());
        for topic_arn in page.topic_arns {
            let attributes = self.service.get_topic_attributes(&topic_arn).await?;
            records.push(TopicRecord {
                topic_arn,
                attributes,
            });
        }

        self.pages_fetched += 1;
        self.next_token = page.next_token.filter(|t| !t.is_empty());
        self.exhausted = self.next_token.is_none();
        tracing::debug!(
            page = self.pages_fetched,
            topics = records.len(),
            more = !self.exhausted,
            "Fetched topic page"
        );
        Ok(Some(records))
    }
}

use crate::config::Settings;
use crate::error::RemoteServiceError;
use crate::model::TopicPage;
use async_trait::async_trait;
use aws_sdk_sns::Client;
use std::collections::BTreeMap;

/// The remote calls the notifier issues, one method per service action.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Returns the message id assigned by the service, if any.
    async fn publish(
        &self,
        topic_arn: &str,
        subject: &str,
        message: &str,
    ) -> Result<Option<String>, RemoteServiceError>;

    /// Returns the subscription ARN, or the service's placeholder while
    /// confirmation is pending.
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<Option<String>, RemoteServiceError>;

    async fn list_topics(&self, next_token: Option<String>) -> Result<TopicPage, RemoteServiceError>;

    async fn get_topic_attributes(
        &self,
        topic_arn: &str,
    ) -> Result<BTreeMap<String, String>, RemoteServiceError>;

    async fn create_topic(&self, name: &str) -> Result<String, RemoteServiceError>;

    async fn set_topic_attribute(
        &self,
        topic_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), RemoteServiceError>;

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), RemoteServiceError>;
}

/// [`NotificationService`] backed by the AWS SNS client.
#[derive(Debug, Clone)]
pub struct SnsService {
    client: Client,
}

impl SnsService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect(settings: &Settings) -> Self {
        let config = settings.load_sdk_config().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl NotificationService for SnsService {
    async fn publish(
        &self,
        topic_arn: &str,
        subject: &str,
        message: &str,
    ) -> Result<Option<String>, RemoteServiceError> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("Publish", e))?;
        Ok(output.message_id().map(str::to_owned))
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<Option<String>, RemoteServiceError> {
        let output = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol)
            .endpoint(endpoint)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("Subscribe", e))?;
        Ok(output.subscription_arn().map(str::to_owned))
    }

    async fn list_topics(&self, next_token: Option<String>) -> Result<TopicPage, RemoteServiceError> {
        let output = self
            .client
            .list_topics()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("ListTopics", e))?;

        let topic_arns = output
            .topics()
            .iter()
            .filter_map(|topic| topic.topic_arn().map(str::to_owned))
            .collect();
        Ok(TopicPage {
            topic_arns,
            next_token: output.next_token().map(str::to_owned),
        })
    }

    async fn get_topic_attributes(
        &self,
        topic_arn: &str,
    ) -> Result<BTreeMap<String, String>, RemoteServiceError> {
        let output = self
            .client
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("GetTopicAttributes", e))?;

        Ok(output
            .attributes()
            .map(|attributes| {
                attributes
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_topic(&self, name: &str) -> Result<String, RemoteServiceError> {
        let output = self
            .client
            .create_topic()
            .name(name)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("CreateTopic", e))?;

        output
            .topic_arn()
            .map(str::to_owned)
            .ok_or_else(|| RemoteServiceError::new("CreateTopic", "response carried no topic ARN"))
    }

    async fn set_topic_attribute(
        &self,
        topic_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), RemoteServiceError> {
        self.client
            .set_topic_attributes()
            .topic_arn(topic_arn)
            .attribute_name(name)
            .attribute_value(value)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("SetTopicAttributes", e))?;
        Ok(())
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), RemoteServiceError> {
        self.client
            .delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| RemoteServiceError::from_sdk("DeleteTopic", e))?;
        Ok(())
    }
}

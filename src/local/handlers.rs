use crate::local::error::error_response;
use crate::local::responses::{self, xml};
use crate::local::state::{AppState, Fault, Message, SharedState, SnsRequest, Subscription, Topic};
use crate::model::{DISPLAY_NAME, Protocol};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Response;
use uuid::Uuid;

const MAX_SUBJECT_LEN: usize = 100;
const MAX_TOPIC_NAME_LEN: usize = 256;
const SETTABLE_ATTRIBUTES: [&str; 4] = [DISPLAY_NAME, "Policy", "DeliveryPolicy", "TracingConfig"];

type Reply = Result<Vec<u8>, Fault>;

pub async fn handle_aws_request(
    State(state): State<SharedState>,
    Form(params): Form<SnsRequest>,
) -> Response {
    state.record(&params);
    let request_id = Uuid::new_v4().to_string();

    let injected = state.faults.get(&params.action).map(|fault| fault.clone());
    let reply = match injected {
        Some(fault) => Err(fault),
        None => dispatch(&state, params, &request_id),
    };

    match reply {
        Ok(body) => xml(StatusCode::OK, &request_id, body),
        Err(fault) => {
            tracing::warn!(code = %fault.code, status = %fault.status, "{}", fault.message);
            error_response(&fault, &request_id)
        }
    }
}

fn dispatch(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    tracing::info!(action = %params.action, "handling request");
    match params.action.as_str() {
        "CreateTopic" => create_topic(state, params, request_id),
        "DeleteTopic" => delete_topic(state, params, request_id),
        "ListTopics" => list_topics(state, params, request_id),
        "Subscribe" => subscribe(state, params, request_id),
        "Publish" => publish(state, params, request_id),
        "GetTopicAttributes" => get_topic_attributes(state, params, request_id),
        "SetTopicAttributes" => set_topic_attributes(state, params, request_id),
        _ => Err(Fault::new("InvalidAction", "Action not supported", StatusCode::BAD_REQUEST)),
    }
}

fn required(value: Option<String>, what: &str) -> Result<String, Fault> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Fault::invalid_parameter(format!("Missing {what}")))
}

fn valid_topic_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_TOPIC_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn create_topic(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let name = required(params.name, "Topic Name")?;
    if !valid_topic_name(&name) {
        return Err(Fault::invalid_parameter(
            "Topic Name must be made up of only uppercase and lowercase ASCII letters, numbers, underscores, and hyphens, and must be between 1 and 256 characters long",
        ));
    }

    // Creating an existing topic returns its ARN again.
    let topic = Topic::new(name, &state.region);
    let arn = topic.arn.clone();
    state.topics.entry(arn.clone()).or_insert(topic);

    Ok(responses::create_topic(request_id, &arn)?)
}

pub fn delete_topic(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let topic_arn = required(params.topic_arn, "Topic ARN")?;

    if state.topics.remove(&topic_arn).is_none() {
        tracing::debug!(topic_arn = %topic_arn, "delete of unknown topic");
    }

    Ok(responses::empty("DeleteTopic", request_id)?)
}

pub fn list_topics(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let mut topics = state
        .topics
        .iter()
        .map(|topic_ref| topic_ref.key().clone())
        .collect::<Vec<_>>();
    topics.sort();

    // The token is the ARN of the first topic on the requested page, so a
    // walk survives deletions between pages.
    let start = match params.next_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => topics.partition_point(|arn| arn.as_str() < token),
        None => 0,
    };
    let end = start.saturating_add(state.page_size).min(topics.len());
    let page = &topics[start..end];
    let next_token = topics.get(end).map(String::as_str);

    Ok(responses::list_topics(request_id, page, next_token)?)
}

pub fn set_topic_attributes(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let topic_arn = required(params.topic_arn, "Topic ARN")?;
    let attribute_name = required(params.attribute_name, "Attribute Name")?;
    let attribute_value = params
        .attribute_value
        .ok_or_else(|| Fault::invalid_parameter("Missing Attribute Value"))?;

    if !SETTABLE_ATTRIBUTES.contains(&attribute_name.as_str()) {
        return Err(Fault::invalid_parameter("Attribute not supported"));
    }

    let mut topic = state
        .topics
        .get_mut(&topic_arn)
        .ok_or_else(|| Fault::not_found("Topic does not exist"))?;
    topic.attributes.insert(attribute_name, attribute_value);
    drop(topic);

    Ok(responses::empty("SetTopicAttributes", request_id)?)
}

pub fn get_topic_attributes(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let topic_arn = required(params.topic_arn, "Topic ARN")?;

    let topic = state
        .topics
        .get(&topic_arn)
        .ok_or_else(|| Fault::not_found("Topic does not exist"))?;

    let mut attributes = vec![
        ("TopicArn".to_string(), topic.arn.clone()),
        ("Owner".to_string(), crate::local::state::ACCOUNT_ID.to_string()),
    ];
    attributes.extend(topic.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    attributes.push((
        "SubscriptionsConfirmed".to_string(),
        topic.confirmed_subscriptions().to_string(),
    ));
    attributes.push((
        "SubscriptionsPending".to_string(),
        topic.pending_subscriptions().to_string(),
    ));
    attributes.push(("SubscriptionsDeleted".to_string(), "0".to_string()));
    drop(topic);

    Ok(responses::get_topic_attributes(request_id, &attributes)?)
}

pub fn subscribe(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let topic_arn = required(params.topic_arn, "Topic ARN")?;
    let endpoint = required(params.endpoint, "endpoint")?;
    let protocol_tag = required(params.protocol, "protocol")?;
    let protocol: Protocol = protocol_tag
        .parse()
        .map_err(|_| Fault::invalid_parameter(format!("Invalid protocol type: {protocol_tag}")))?;

    let mut topic = state
        .topics
        .get_mut(&topic_arn)
        .ok_or_else(|| Fault::not_found("Topic does not exist"))?;

    let pending = protocol.requires_confirmation();
    let arn = topic.arn.clone();
    let subscription_arn = format!("{arn}:{}", Uuid::new_v4());
    topic.subscriptions.push(Subscription {
        endpoint,
        protocol: protocol.as_str().to_string(),
        topic_arn: arn,
        subscription_arn: subscription_arn.clone(),
        pending,
    });
    drop(topic);

    let answer = if pending { "pending confirmation" } else { subscription_arn.as_str() };
    Ok(responses::subscribe(request_id, answer)?)
}

pub fn publish(state: &AppState, params: SnsRequest, request_id: &str) -> Reply {
    let topic_arn = required(params.topic_arn, "Topic ARN")?;
    let body = required(params.message, "message")?;

    if let Some(subject) = &params.subject {
        if subject.is_empty()
            || subject.chars().count() > MAX_SUBJECT_LEN
            || subject.chars().any(|c| c.is_control())
        {
            return Err(Fault::invalid_parameter(
                "Subject must be non-empty, at most 100 characters and free of control characters",
            ));
        }
    }

    let mut topic = state
        .topics
        .get_mut(&topic_arn)
        .ok_or_else(|| Fault::not_found("Topic does not exist"))?;

    let message = Message {
        id: Uuid::new_v4().to_string(),
        subject: params.subject,
        body,
        timestamp: chrono::Utc::now(),
    };
    for subscription in topic.subscriptions.iter().filter(|s| !s.pending) {
        tracing::info!(
            protocol = %subscription.protocol,
            endpoint = %subscription.endpoint,
            message_id = %message.id,
            "delivering message"
        );
    }
    let message_id = message.id.clone();
    topic.messages.push(message);
    drop(topic);

    Ok(responses::publish(request_id, &message_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZEBRA: &str = "arn:aws:sns:eu-central-1:000000000000:zebra";

    fn state() -> AppState {
        AppState::new("eu-central-1".to_string(), 2)
    }

    fn request(action: &str) -> SnsRequest {
        SnsRequest {
            action: action.to_string(),
            ..Default::default()
        }
    }

    fn create(state: &AppState, name: &str) {
        let params = SnsRequest {
            name: Some(name.to_string()),
            ..request("CreateTopic")
        };
        dispatch(state, params, "r").unwrap();
    }

    #[test]
    fn create_is_idempotent_and_uses_region() {
        let state = state();
        create(&state, "zebra");
        create(&state, "zebra");

        assert_eq!(state.topics.len(), 1);
        assert_eq!(state.topics.get(ZEBRA).unwrap().name, "zebra");
    }

    #[test]
    fn rejects_bad_topic_names() {
        let params = SnsRequest {
            name: Some("no spaces".to_string()),
            ..request("CreateTopic")
        };
        let fault = dispatch(&state(), params, "r").unwrap_err();
        assert_eq!(fault.code, "InvalidParameter");
    }

    #[test]
    fn pages_by_arn_and_hands_out_next_arn() {
        let state = state();
        for name in ["c", "a", "e", "b", "d"] {
            create(&state, name);
        }

        let first = String::from_utf8(dispatch(&state, request("ListTopics"), "r").unwrap()).unwrap();
        assert!(first.contains(":a</TopicArn>") && first.contains(":b</TopicArn>"));
        assert!(first.contains("<NextToken>arn:aws:sns:eu-central-1:000000000000:c</NextToken>"));

        let params = SnsRequest {
            next_token: Some("arn:aws:sns:eu-central-1:000000000000:e".to_string()),
            ..request("ListTopics")
        };
        let last = String::from_utf8(dispatch(&state, params, "r").unwrap()).unwrap();
        assert!(last.contains(":e</TopicArn>"));
        assert!(!last.contains("NextToken"));
    }

    #[test]
    fn huge_page_size_ends_on_the_last_topic() {
        let state = AppState::new("eu-central-1".to_string(), usize::MAX);
        create(&state, "a");
        create(&state, "b");

        let params = SnsRequest {
            next_token: Some("arn:aws:sns:eu-central-1:000000000000:b".to_string()),
            ..request("ListTopics")
        };
        let body = String::from_utf8(dispatch(&state, params, "r").unwrap()).unwrap();

        assert!(body.contains(":b</TopicArn>"));
        assert!(!body.contains(":a</TopicArn>"));
        assert!(!body.contains("NextToken"));
    }

    #[test]
    fn topics_are_matched_by_full_arn() {
        let state = state();
        create(&state, "zebra");
        let foreign = "arn:aws:sns:us-west-2:999999999999:zebra";

        let delete = SnsRequest {
            topic_arn: Some(foreign.to_string()),
            ..request("DeleteTopic")
        };
        dispatch(&state, delete, "r").unwrap();
        assert!(state.topics.contains_key(ZEBRA));

        let publish = SnsRequest {
            topic_arn: Some(foreign.to_string()),
            message: Some("body".to_string()),
            ..request("Publish")
        };
        assert_eq!(dispatch(&state, publish, "r").unwrap_err().status, StatusCode::NOT_FOUND);
        assert!(state.topics.get(ZEBRA).unwrap().messages.is_empty());
    }

    #[test]
    fn email_subscriptions_stay_pending() {
        let state = state();
        create(&state, "zebra");
        let params = SnsRequest {
            topic_arn: Some(ZEBRA.to_string()),
            protocol: Some("email".to_string()),
            endpoint: Some("ops@example.com".to_string()),
            ..request("Subscribe")
        };

        let body = String::from_utf8(dispatch(&state, params, "r").unwrap()).unwrap();

        assert!(body.contains("<SubscriptionArn>pending confirmation</SubscriptionArn>"));
        assert_eq!(state.topics.get(ZEBRA).unwrap().pending_subscriptions(), 1);
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let state = state();
        create(&state, "zebra");
        let params = SnsRequest {
            topic_arn: Some(ZEBRA.to_string()),
            protocol: Some("pigeon".to_string()),
            endpoint: Some("roof".to_string()),
            ..request("Subscribe")
        };
        assert_eq!(dispatch(&state, params, "r").unwrap_err().code, "InvalidParameter");
    }

    #[test]
    fn publish_requires_existing_topic_and_sane_subject() {
        let state = state();
        create(&state, "zebra");
        let message = |subject: &str, topic: &str| SnsRequest {
            topic_arn: Some(topic.to_string()),
            subject: Some(subject.to_string()),
            message: Some("body".to_string()),
            ..request("Publish")
        };

        let missing = dispatch(&state, message("S", "arn:aws:sns:eu-central-1:000000000000:gone"), "r");
        assert_eq!(missing.unwrap_err().status, StatusCode::NOT_FOUND);

        let long = "x".repeat(101);
        let too_long = dispatch(&state, message(&long, ZEBRA), "r");
        assert_eq!(too_long.unwrap_err().code, "InvalidParameter");

        dispatch(&state, message("S", ZEBRA), "r").unwrap();
        let topic = state.topics.get(ZEBRA).unwrap();
        assert_eq!(topic.messages.len(), 1);
        assert_eq!(topic.messages[0].subject.as_deref(), Some("S"));
    }

    #[test]
    fn only_known_attributes_can_be_set() {
        let state = state();
        create(&state, "zebra");
        let set = |name: &str| SnsRequest {
            topic_arn: Some(ZEBRA.to_string()),
            attribute_name: Some(name.to_string()),
            attribute_value: Some("value".to_string()),
            ..request("SetTopicAttributes")
        };

        dispatch(&state, set("DisplayName"), "r").unwrap();
        assert_eq!(dispatch(&state, set("Colour"), "r").unwrap_err().code, "InvalidParameter");
        assert_eq!(
            state.topics.get(ZEBRA).unwrap().attributes.get("DisplayName").map(String::as_str),
            Some("value")
        );
    }

    #[test]
    fn deleting_unknown_topic_succeeds() {
        let params = SnsRequest {
            topic_arn: Some("arn:aws:sns:eu-central-1:000000000000:gone".to_string()),
            ..request("DeleteTopic")
        };
        assert!(dispatch(&state(), params, "r").is_ok());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert_eq!(dispatch(&state(), request("Unsubscribe"), "r").unwrap_err().code, "InvalidAction");
    }
}

use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quick_xml::Writer;
use quick_xml::events::BytesText;
use std::io::{self, Cursor};

pub const SNS_XMLNS: &str = "http://sns.amazonaws.com/doc/2010-03-31/";
pub const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

pub type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Writes `<{action}Response>` holding an optional `<{action}Result>` and the
/// response metadata.
fn document<F>(action: &str, request_id: &str, result: Option<F>) -> io::Result<Vec<u8>>
where
    F: FnOnce(&mut XmlWriter) -> io::Result<()>,
{
    let root = format!("{action}Response");
    let result_element = format!("{action}Result");
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .create_element(&root)
        .with_attribute(("xmlns", SNS_XMLNS))
        .write_inner_content(|writer| {
            if let Some(result) = result {
                writer
                    .create_element(&result_element)
                    .write_inner_content(result)?;
            }
            writer.create_element("ResponseMetadata").write_inner_content(|writer| {
                writer.create_element("RequestId").write_text_content(BytesText::new(request_id))?;
                Ok(())
            })?;
            Ok(())
        })?;
    Ok(writer.into_inner().into_inner())
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> io::Result<()> {
    writer.create_element(name).write_text_content(BytesText::new(text))?;
    Ok(())
}

type NoResult = fn(&mut XmlWriter) -> io::Result<()>;

pub fn empty(action: &str, request_id: &str) -> io::Result<Vec<u8>> {
    document::<NoResult>(action, request_id, None)
}

pub fn create_topic(request_id: &str, topic_arn: &str) -> io::Result<Vec<u8>> {
    document(
        "CreateTopic",
        request_id,
        Some(|writer: &mut XmlWriter| text_element(writer, "TopicArn", topic_arn)),
    )
}

pub fn list_topics(request_id: &str, topic_arns: &[String], next_token: Option<&str>) -> io::Result<Vec<u8>> {
    document(
        "ListTopics",
        request_id,
        Some(|writer: &mut XmlWriter| {
            writer.create_element("Topics").write_inner_content(|writer| {
                for topic_arn in topic_arns {
                    writer
                        .create_element("member")
                        .write_inner_content(|writer| text_element(writer, "TopicArn", topic_arn))?;
                }
                Ok(())
            })?;
            if let Some(token) = next_token {
                text_element(writer, "NextToken", token)?;
            }
            Ok(())
        }),
    )
}

pub fn get_topic_attributes(request_id: &str, attributes: &[(String, String)]) -> io::Result<Vec<u8>> {
    document(
        "GetTopicAttributes",
        request_id,
        Some(|writer: &mut XmlWriter| {
            writer.create_element("Attributes").write_inner_content(|writer| {
                for (key, value) in attributes {
                    writer.create_element("entry").write_inner_content(|writer| {
                        text_element(writer, "key", key)?;
                        text_element(writer, "value", value)
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        }),
    )
}

pub fn subscribe(request_id: &str, subscription_arn: &str) -> io::Result<Vec<u8>> {
    document(
        "Subscribe",
        request_id,
        Some(|writer: &mut XmlWriter| text_element(writer, "SubscriptionArn", subscription_arn)),
    )
}

pub fn publish(request_id: &str, message_id: &str) -> io::Result<Vec<u8>> {
    document(
        "Publish",
        request_id,
        Some(|writer: &mut XmlWriter| text_element(writer, "MessageId", message_id)),
    )
}

/// Wraps a rendered document, echoing the request id in the header the SDK
/// reads it from.
pub fn xml(status: StatusCode, request_id: &str, body: Vec<u8>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/xml".to_string()),
            (HeaderName::from_static(REQUEST_ID_HEADER), request_id.to_string()),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: io::Result<Vec<u8>>) -> String {
        String::from_utf8(bytes.unwrap()).unwrap()
    }

    #[test]
    fn list_omits_token_on_last_page() {
        let arns = vec!["arn:aws:sns:us-east-1:000000000000:a".to_string()];

        let last = text(list_topics("r1", &arns, None));
        let more = text(list_topics("r2", &arns, Some("b")));

        assert!(last.contains("<member><TopicArn>arn:aws:sns:us-east-1:000000000000:a</TopicArn></member>"));
        assert!(!last.contains("NextToken"));
        assert!(more.contains("<NextToken>b</NextToken>"));
        assert!(more.contains("<RequestId>r2</RequestId>"));
    }

    #[test]
    fn empty_document_has_only_metadata() {
        let body = text(empty("DeleteTopic", "r1"));
        assert!(body.starts_with("<DeleteTopicResponse xmlns=\"http://sns.amazonaws.com/doc/2010-03-31/\">"));
        assert!(!body.contains("DeleteTopicResult"));
        assert!(body.contains("<ResponseMetadata><RequestId>r1</RequestId></ResponseMetadata>"));
    }

    #[test]
    fn attributes_are_key_value_entries() {
        let attributes = vec![("DisplayName".to_string(), "Zebra & Co".to_string())];
        let body = text(get_topic_attributes("r1", &attributes));
        assert!(body.contains("<entry><key>DisplayName</key><value>Zebra &amp; Co</value></entry>"));
    }
}

use crate::local::responses::{SNS_XMLNS, xml};
use crate::local::state::Fault;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quick_xml::Writer;
use quick_xml::events::BytesText;
use std::io::{self, Cursor};

/// `Sender` for faults caused by the request, `Receiver` for the endpoint's own.
fn fault_type(status: StatusCode) -> &'static str {
    if status.is_server_error() { "Receiver" } else { "Sender" }
}

fn error_document(fault: &Fault, request_id: &str) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .create_element("ErrorResponse")
        .with_attribute(("xmlns", SNS_XMLNS))
        .write_inner_content(|writer| {
            writer.create_element("Error").write_inner_content(|writer| {
                writer.create_element("Type").write_text_content(BytesText::new(fault_type(fault.status)))?;
                writer.create_element("Code").write_text_content(BytesText::new(&fault.code))?;
                writer.create_element("Message").write_text_content(BytesText::new(&fault.message))?;
                Ok(())
            })?;
            writer.create_element("RequestId").write_text_content(BytesText::new(request_id))?;
            Ok(())
        })?;
    Ok(writer.into_inner().into_inner())
}

pub fn error_response(fault: &Fault, request_id: &str) -> Response {
    match error_document(fault, request_id) {
        Ok(body) => xml(fault.status, request_id, body),
        Err(err) => {
            tracing::error!("failed to render error response: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, fault.message.clone()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_are_sender_errors() {
        let body = error_document(&Fault::not_found("Topic does not exist"), "r1").unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains("<Type>Sender</Type><Code>NotFound</Code><Message>Topic does not exist</Message>"));
        assert!(body.ends_with("<RequestId>r1</RequestId></ErrorResponse>"));
    }

    #[test]
    fn server_faults_are_receiver_errors() {
        let body = error_document(&Fault::internal("boom"), "r1").unwrap();
        assert!(String::from_utf8(body).unwrap().contains("<Type>Receiver</Type>"));
    }

    #[test]
    fn response_carries_status_and_request_id() {
        let response = error_response(&Fault::invalid_parameter("Missing Topic ARN"), "r1");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-amzn-requestid"], "r1");
    }
}

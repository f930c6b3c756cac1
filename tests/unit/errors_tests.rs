/*!
 * Tests for error types and their conversions
 */

use subtool::errors::{ProviderError, TimelineError, TranscriptionError, ValidationError};

#[test]
fn test_providerErrorDisplay_shouldDescribeEachVariant() {
    assert_eq!(
        ProviderError::RequestFailed("boom".to_string()).to_string(),
        "API request failed: boom"
    );
    assert_eq!(ProviderError::EmptyResponse.to_string(), "API returned an empty response");
    assert_eq!(
        ProviderError::ConnectionError("timed out".to_string()).to_string(),
        "Connection error: timed out"
    );
    assert!(ProviderError::ParseError("bad".to_string()).to_string().contains("bad"));
}

#[test]
fn test_providerErrorDetails_shouldOnlyExistForApiErrors() {
    assert!(ProviderError::EmptyResponse.details().is_none());
    let api = ProviderError::ApiError {
        status_code: 500,
        status: "INTERNAL".to_string(),
        message: "oops".to_string(),
        details: Default::default(),
    };
    assert!(api.details().is_some());
}

#[test]
fn test_transcriptionError_fromValidation_shouldBeInvalidOutput() {
    let error: TranscriptionError = ValidationError::InvalidTimeRange {
        index: 0,
        start_ms: 10,
        end_ms: 5,
    }
    .into();

    assert!(matches!(error, TranscriptionError::InvalidOutput(_)));
}

#[test]
fn test_root_withNestedSegments_shouldReturnUnderlyingError() {
    let error = TranscriptionError::Segment {
        index: 3,
        source: Box::new(TranscriptionError::Segment {
            index: 3,
            source: Box::new(TranscriptionError::Provider(ProviderError::EmptyResponse)),
        }),
    };

    assert!(matches!(
        error.root(),
        TranscriptionError::Provider(ProviderError::EmptyResponse)
    ));
    assert!(error.to_string().starts_with("Segment 3 failed"));
}

#[test]
fn test_transcriptionError_fromTimeline_shouldKeepMessage() {
    let error: TranscriptionError = TimelineError::Precondition("2 transcripts for 3 segments".to_string()).into();

    assert!(error.to_string().contains("2 transcripts for 3 segments"));
}

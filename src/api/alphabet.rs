use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::{metrics, state::AppState};
use crate::schemas::alphabet::{AlphabetMasteryRequest, AlphabetMasteryResponse};
use crate::schemas::STATUS_SUCCESS;
use crate::services::letter_match::{
    self, AnswerError, ExpectedAnswer, LetterCase, Level, Thresholds,
};
use crate::services::vision_ocr::OcrError;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/alphabet_mastery", post(alphabet_mastery))
}

async fn alphabet_mastery(
    State(state): State<AppState>,
    Json(payload): Json<AlphabetMasteryRequest>,
) -> Result<Json<AlphabetMasteryResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // Field checks run in a fixed order so the first problem is reported.
    if payload.expected_letter.trim().is_empty() {
        return Err(answer_error(AnswerError::Missing));
    }
    let case = LetterCase::parse(&payload.is_capital).map_err(answer_error)?;
    let level = Level::parse(&payload.level).map_err(answer_error)?;
    let expected =
        ExpectedAnswer::parse(&payload.expected_letter, case, level).map_err(answer_error)?;

    let symbols = state.ocr().recognize(&payload.canvas_input).await.map_err(ocr_error)?;

    let thresholds = Thresholds::from(state.settings().scoring());
    let result = letter_match::score(&symbols, &expected, &thresholds);

    metrics::record_alphabet_attempt(&result.mode, result.is_correct);
    tracing::info!(
        mode = %result.mode,
        expected = %result.expected_letter,
        is_correct = result.is_correct,
        detected_count = result.detected_count,
        reason = %result.reason,
        "alphabet attempt scored"
    );

    Ok(Json(AlphabetMasteryResponse { status: STATUS_SUCCESS, result }))
}

fn answer_error(err: AnswerError) -> ApiError {
    ApiError::BadRequest(err.to_string())
}

fn ocr_error(err: OcrError) -> ApiError {
    if err.is_client_error() {
        return ApiError::BadRequest(err.to_string());
    }
    match err {
        OcrError::MissingApiKey => ApiError::Internal(err.to_string()),
        _ => ApiError::BadGateway(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        http::{Method, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::router::router;
    use crate::core::config::Settings;
    use crate::test_support;

    const CANVAS: &str = "data:image/png;base64,aGVsbG8gY2FudmFz";

    async fn app_with_vision(base_url: &str) -> Router {
        std::env::set_var("GCV_API_KEY", "test-vision-key");
        std::env::set_var("GCV_BASE_URL", base_url);
        let settings = Settings::load().expect("settings");
        router(test_support::build_state(settings))
    }

    fn attempt(expected_letter: &str, is_capital: &str, level: &str) -> Value {
        json!({
            "canvas_input": CANVAS,
            "expected_letter": expected_letter,
            "is_capital": is_capital,
            "level": level,
        })
    }

    fn vision_stub(symbols: &'static [(&'static str, Option<f64>)]) -> Router {
        Router::new().route(
            "/images:annotate",
            post(move || async move { Json(test_support::vision_response(symbols)) }),
        )
    }

    #[tokio::test]
    async fn strong_single_letter_is_correct() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let base_url = test_support::spawn_stub(vision_stub(&[("A", Some(0.91))])).await;
        let app = app_with_vision(&base_url).await;

        let response = app
            .oneshot(test_support::json_request(
                Method::POST,
                "/alphabet_mastery",
                None,
                Some(attempt("a", "capital", "easy")),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["mode"], "capital-easy");
        assert_eq!(body["expected_letter"], "A");
        assert_eq!(body["is_correct"], true);
        assert_eq!(body["match_count"], 1);
        assert_eq!(body["mismatches"], json!([]));
        assert_eq!(body["letters"][0]["letter"], "A");
    }

    #[tokio::test]
    async fn hard_pair_out_of_order_is_incorrect() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let stub = vision_stub(&[("b", Some(0.9)), ("a", Some(0.9))]);
        let base_url = test_support::spawn_stub(stub).await;
        let app = app_with_vision(&base_url).await;

        let response = app
            .oneshot(test_support::json_request(
                Method::POST,
                "/alphabet_mastery",
                None,
                Some(attempt("ab", "small", "hard")),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["is_correct"], false);
        assert_eq!(body["reason"], "Letters not detected in the required order 'ab'.");
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected_before_ocr() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let app = app_with_vision(&test_support::closed_port_url().await).await;

        let cases = [
            (attempt("  ", "capital", "easy"), "expected_letter is required"),
            (attempt("a", "upper", "easy"), "is_capital must be 'capital' or 'small'"),
            (attempt("a", "small", "medium"), "level must be 'easy' or 'hard'"),
            (attempt("a1", "small", "hard"), "expected_letter must be letters only"),
            (
                attempt("ab", "small", "easy"),
                "For 'easy', expected_letter must be exactly 1 letter",
            ),
        ];

        for (payload, detail) in cases {
            let response = app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    "/alphabet_mastery",
                    None,
                    Some(payload),
                ))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = test_support::read_json(response).await;
            assert_eq!(body["detail"], detail);
        }
    }

    #[tokio::test]
    async fn invalid_base64_is_a_client_error() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let app = app_with_vision(&test_support::closed_port_url().await).await;

        let mut payload = attempt("a", "small", "easy");
        payload["canvas_input"] = json!("data:image/png;base64,@@not-base64@@");

        let response = app
            .oneshot(test_support::json_request(
                Method::POST,
                "/alphabet_mastery",
                None,
                Some(payload),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::read_json(response).await;
        assert_eq!(body["detail"], "Invalid base64 image");
    }

    #[tokio::test]
    async fn vision_failure_is_bad_gateway() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let stub = Router::new().route(
            "/images:annotate",
            post(|| async {
                (StatusCode::FORBIDDEN, Json(json!({"error": {"message": "API key invalid"}})))
            }),
        );
        let base_url = test_support::spawn_stub(stub).await;
        let app = app_with_vision(&base_url).await;

        let response = app
            .oneshot(test_support::json_request(
                Method::POST,
                "/alphabet_mastery",
                None,
                Some(attempt("a", "small", "easy")),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn missing_vision_key_is_internal_error() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");
        let app = router(test_support::build_state(settings));

        let response = app
            .oneshot(test_support::json_request(
                Method::POST,
                "/alphabet_mastery",
                None,
                Some(attempt("a", "small", "easy")),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = test_support::read_json(response).await;
        assert_eq!(body["detail"], "Missing GCV_API_KEY configuration");
    }
}

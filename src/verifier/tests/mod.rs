
use super::*;
use crate::{
    claim::{ClaimValue, ResourceActions, AUDIENCE, EXPIRES, ID, ISSUED, ISSUER, NOT_BEFORE, SUBJECT},
    envelope::{Algorithm, CheckError, InvalidSignature, TokenParseError},
    signer::{sign, DistributionRsaSigner, RsaSigner, Signer},
};
use chrono::Duration;
use fixtures::*;
use rstest::rstest;
use serde_json::json;

fn window_token() -> Vec<u8> {
    sign(&signer(), &["svc"], "user", false, timestamp(100), timestamp(200)).expect("signing failed")
}

#[test]
fn round_trip() {
    let not_before = Utc::now();
    let expires = not_before + Duration::hours(1);
    let token = sign(&signer(), &["svc"], "test-subject", false, not_before, expires).expect("signing failed");

    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert_eq!(result.subject, "test-subject");
    assert_eq!(result.audience, Audiences::from(["svc"]));
    assert_eq!(result.claim_audiences, Audiences::from(["svc"]));
    assert!(!result.is_online);
    assert!(result.fingerprint.is_empty());

    let not_before_delta = result.not_before.expect("no not before") - not_before;
    let expires_delta = result.expires.expect("no expiry") - expires;
    assert!(not_before_delta.num_microseconds().expect("overflow").abs() < 1000);
    assert!(expires_delta.num_microseconds().expect("overflow").abs() < 1000);
}

#[test]
fn no_claims() {
    let token = signer().sign_claims(vec![]).expect("signing failed");
    Asserter::new(&["svc"]).assert_failure(&token, VerifyError::InvalidAudience);
}

#[test]
fn invalid_audience() {
    let token = window_token();
    Asserter::new(&["other"]).with_current_time(timestamp(150)).assert_failure(&token, VerifyError::InvalidAudience);
}

#[test]
fn verifier_without_audiences() {
    let token = window_token();
    Asserter::new(&[]).with_current_time(timestamp(150)).assert_failure(&token, VerifyError::InvalidAudience);
}

#[test]
fn one_of_many_audiences() {
    let token = sign(&signer(), &["other", "Svc"], "user", false, timestamp(100), timestamp(200))
        .expect("signing failed");
    let result = Asserter::new(&["svc", "unrelated"]).with_current_time(timestamp(150)).assert_success(&token);
    assert_eq!(result.audience, Audiences::from(["Svc"]));
    assert_eq!(result.claim_audiences, Audiences::from(["other", "Svc"]));
}

#[test]
fn accepted_audiences_follow_verifier_order() {
    let token =
        sign(&signer(), &["a", "b", "c"], "user", false, timestamp(100), timestamp(200)).expect("signing failed");
    let result = Asserter::new(&["c", "x", "a"]).with_current_time(timestamp(150)).assert_success(&token);
    assert_eq!(result.audience, Audiences::from(["c", "a"]));
}

#[test]
fn non_ascii_audiences_fold_case() {
    let token = sign(&signer(), &["CAFÉ-SERVICE", "other"], "user", false, timestamp(100), timestamp(200))
        .expect("signing failed");
    let result = Asserter::new(&["café-service"]).with_current_time(timestamp(150)).assert_success(&token);
    assert_eq!(result.audience, Audiences::from(["CAFÉ-SERVICE"]));
}

#[rstest]
#[case::before_not_before(timestamp(50))]
#[case::at_expiry(timestamp(200))]
#[case::after_expiry(timestamp(250))]
fn time_not_valid(#[case] now: DateTime<Utc>) {
    let token = window_token();
    Asserter::new(&["svc"]).with_current_time(now).assert_failure(&token, VerifyError::TimeNotValid);
}

#[rstest]
#[case::at_not_before(timestamp(100))]
#[case::within(timestamp(150))]
#[case::before_expiry(timestamp(199))]
fn time_valid(#[case] now: DateTime<Utc>) {
    let token = window_token();
    let result = Asserter::new(&["svc"]).with_current_time(now).assert_success(&token);
    assert_eq!(result.not_before, Some(timestamp(100)));
    assert_eq!(result.expires, Some(timestamp(200)));
}

#[test]
fn no_time_bounds() {
    let token = signer()
        .sign_claims(vec![Claim::strings(AUDIENCE, ["svc"]), Claim::string(SUBJECT, "user")])
        .expect("signing failed");
    let result = Asserter::new(&["svc"]).with_current_time(timestamp(0)).assert_success(&token);
    assert_eq!(result.not_before, None);
    assert_eq!(result.expires, None);
}

#[test]
fn online() {
    let token = sign(&signer(), &["svc"], "user", true, timestamp(100), timestamp(200)).expect("signing failed");
    let result = Asserter::new(&["svc"]).with_current_time(timestamp(150)).assert_success(&token);
    assert!(result.is_online);
    assert!(result.fingerprint.is_empty());
}

#[test]
fn online_with_fingerprint() {
    let token = signer()
        .sign_claims(vec![
            Claim::strings(AUDIENCE, ["svc"]),
            Claim::bool(ONLINE, true),
            Claim::string(FINGERPRINT, "ab:cd:ef"),
        ])
        .expect("signing failed");
    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert!(result.is_online);
    assert_eq!(result.fingerprint, "ab:cd:ef");
}

#[test]
fn well_known_claims_with_other_types() {
    let token = signer()
        .sign_claims(vec![Claim::strings(AUDIENCE, ["svc"]), Claim::string(ONLINE, "yes"), Claim::int(FINGERPRINT, 3)])
        .expect("signing failed");
    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert!(!result.is_online);
    assert!(result.fingerprint.is_empty());
}

#[test]
fn custom_id() {
    let token = signer()
        .sign_claims(vec![Claim::strings(AUDIENCE, ["svc"]), Claim::string(ID, "my-token")])
        .expect("signing failed");
    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert_eq!(result.id, "my-token");
}

#[test]
fn generated_id() {
    let token = signer().sign_claims(vec![Claim::strings(AUDIENCE, ["svc"])]).expect("signing failed");
    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert!(!result.id.is_empty());
    assert_eq!(result.claims[ID].as_str().expect("not a string"), result.id);
}

#[test]
fn last_claim_wins() {
    let token = signer()
        .sign_claims(vec![
            Claim::strings(AUDIENCE, ["svc"]),
            Claim::string(SUBJECT, "first"),
            Claim::string("Subject", "second"),
        ])
        .expect("signing failed");
    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert_eq!(result.subject, "second");
}

#[test]
fn custom_claims() {
    let actions = ResourceActions {
        resource_type: "repository".into(),
        class: String::new(),
        name: "app".into(),
        actions: vec!["pull".into()],
    };
    let token = signer()
        .sign_claims(vec![
            Claim::strings(AUDIENCE, ["svc"]),
            Claim::string("custom", "value"),
            Claim::int("count", 42),
            Claim::strings("groups", ["admin", "dev"]),
            Claim::resource_actions("access", vec![actions]),
        ])
        .expect("signing failed");
    let result = Asserter::new(&["svc"]).assert_success(&token);

    assert_eq!(result.claims["custom"], Claim::string("custom", "value"));
    assert_eq!(result.claims["count"], Claim::int64("count", 42));
    assert_eq!(result.claims["groups"], Claim::strings("groups", ["admin", "dev"]));
    assert_eq!(
        result.claims["access"].value(),
        &ClaimValue::Reflect(json!([{"type": "repository", "name": "app", "actions": ["pull"]}]))
    );
}

#[test]
fn materialized_claims() {
    let token = sign(&signer(), &["svc"], "user", true, timestamp(100), timestamp(200)).expect("signing failed");
    let result = Asserter::new(&["svc"]).with_current_time(timestamp(150)).assert_success(&token);

    let claims = &result.claims;
    assert_eq!(claims[ISSUER], Claim::string(ISSUER, ISSUER_NAME));
    assert_eq!(claims[SUBJECT], Claim::string(SUBJECT, "user"));
    assert_eq!(claims[AUDIENCE], Claim::strings(AUDIENCE, ["svc"]));
    assert_eq!(claims[ONLINE], Claim::bool(ONLINE, true));
    assert_eq!(claims[NOT_BEFORE].time_value().expect("not a time"), timestamp(100));
    assert_eq!(claims[EXPIRES].time_value().expect("not a time"), timestamp(200));
    assert!(!claims.contains_key(ISSUED));
    assert!(claims.contains_key(ID));
}

#[rstest]
#[case::rs256(Algorithm::RS256)]
#[case::rs384(Algorithm::RS384)]
#[case::rs512(Algorithm::RS512)]
fn algorithms(#[case] algorithm: Algorithm) {
    let signer = signer().algorithm(algorithm);
    let token = sign(&signer, &["svc"], "user", false, timestamp(100), timestamp(200)).expect("signing failed");
    let result = Asserter::new(&["svc"]).with_current_time(timestamp(150)).assert_success(&token);
    assert_eq!(result.subject, "user");
}

#[test]
fn hmac_token() {
    let token = concat!(
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.",
        "eyJzdWIiOiIxMjM0NTY3ODkwIiwiYXVkIjoic3ZjIn0.",
        "SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c"
    );
    let err = Asserter::new(&["svc"]).assert_check_failure(token.as_bytes());
    assert!(matches!(err, VerifyError::Check(CheckError::Algorithm(_))), "unexpected error: {err}");
    assert_eq!(err.to_string(), r#"jwt failed check: algorithm "HS256" not in use"#);
}

#[test]
fn signed_with_other_key() {
    let signer = RsaSigner::new(OTHER_PRIVATE_KEY.clone()).issuer(ISSUER_NAME);
    let token = sign(&signer, &["svc"], "user", false, timestamp(100), timestamp(200)).expect("signing failed");
    let err = Asserter::new(&["svc"]).with_current_time(timestamp(150)).assert_check_failure(&token);
    assert!(
        matches!(err, VerifyError::Check(CheckError::Signature(InvalidSignature::Mismatch))),
        "unexpected error: {err}"
    );
}

#[rstest]
#[case::empty("")]
#[case::garbage("garbage")]
#[case::dots("..")]
#[case::base64_garbage("Z2FyYmFnZQ.Z2FyYmFnZQ.Z2FyYmFnZQ")]
#[case::empty_json("e30.e30.e30")]
fn malformed_token(#[case] token: &str) {
    Asserter::new(&["svc"]).assert_check_failure(token.as_bytes());
}

#[test]
fn token_too_large() {
    let token = window_token();
    let decoder = TokenDecoder { max_raw_token_size: 64 };
    let err = Asserter::new(&["svc"]).with_decoder(decoder).assert_check_failure(&token);
    assert!(
        matches!(err, VerifyError::Check(CheckError::Parse(TokenParseError::TooLarge(64)))),
        "unexpected error: {err}"
    );
}

#[test]
fn large_token() {
    let groups: Vec<_> = (0..800).map(|i| format!("group-{i:04}")).collect();
    let token = signer()
        .sign_claims(vec![Claim::strings(AUDIENCE, ["svc"]), Claim::strings("groups", groups.clone())])
        .expect("signing failed");
    assert!(token.len() > 10 * 1024);

    let result = Asserter::new(&["svc"]).assert_success(&token);
    assert_eq!(result.claims["groups"], Claim::strings("groups", groups));
}

#[test]
fn distribution_token() {
    let signer = DistributionRsaSigner::new(signer());
    let token = sign(&signer, &["registry", "other"], "user", false, timestamp(100), timestamp(200))
        .expect("signing failed");
    let result = Asserter::new(&["registry"]).with_current_time(timestamp(150)).assert_success(&token);
    assert_eq!(result.claim_audiences, Audiences::from(["registry"]));
    assert_eq!(result.claims[AUDIENCE], Claim::strings(AUDIENCE, ["registry"]));
}

#[test]
fn verifier_from_files() {
    let testdata = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata");
    let signer = RsaSigner::from_file(testdata.join("key.pem")).expect("invalid private key");
    let verifier = RsaVerifier::from_file(vec!["svc".into()], testdata.join("cert.pem")).expect("invalid certificate");
    assert_eq!(verifier.audiences(), ["svc"]);

    let now = Utc::now();
    let token = sign(&signer, &["svc"], "user", false, now, now + Duration::minutes(5)).expect("signing failed");
    let result = verifier.verify(&token).expect("verification failed");
    assert_eq!(result.subject, "user");
}

#[test]
fn verifier_from_other_certificate() {
    let verifier = RsaVerifier::from_pem(vec!["svc".into()], include_bytes!("../../../testdata/other_cert.pem"))
        .expect("invalid certificate");
    let now = Utc::now();
    let token = sign(&signer(), &["svc"], "user", false, now, now + Duration::minutes(5)).expect("signing failed");
    let err = verifier.verify(&token).expect_err("verification succeeded");
    assert!(matches!(err, VerifyError::Check(CheckError::Signature(_))), "unexpected error: {err}");
}

// self
use aws_access_broker::{
	_preludet::*,
	broker::{BecomeRequest, Broker, BrokerOutput},
	error::{ConfigError, ErrorKind},
	mint::{DEFAULT_FEDERATION_POLICY, SessionDuration},
	model::{Association, Identity, Target, TargetId, Username},
	output::{DEFAULT_CONSOLE_DESTINATION, OutputFormat},
};

const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/S3Access";
const USER_ARN: &str = "arn:aws:iam::123456789012:user/prod-admin";

fn username(value: &str) -> Username {
	Username::new(value).expect("Username fixture should be valid.")
}

fn target_id(value: &str) -> TargetId {
	TargetId::new(value).expect("Target id fixture should be valid.")
}

fn alice() -> Identity {
	Identity::new(username("alice"), ["g1"])
}

async fn with_role(harness: &TestBroker) {
	harness
		.store
		.put_target(
			&Target::role("s3", ROLE_ARN, "g1").with_id(target_id("t1")).with_external_id("ext-42"),
		)
		.await
		.expect("Role target should be created.");
}

async fn with_user(harness: &TestBroker, plaintext: &str) {
	let ciphertext =
		harness.cipher.encrypt("alias/test", plaintext).await.expect("Fixture secret should encrypt.");

	harness
		.store
		.put_target(&Target::user("Prod Admin", USER_ARN, "g1", ciphertext).with_id(target_id("u1")))
		.await
		.expect("User target should be created.");
}

fn file_of(output: BrokerOutput) -> String {
	match output {
		BrokerOutput::File(file) => file,
		other => panic!("Expected a credentials file, got {other:?}."),
	}
}

#[tokio::test]
async fn role_targets_yield_a_credentials_file() {
	let harness = build_test_broker(test_config(false), 10);

	with_role(&harness).await;

	let request = BecomeRequest::new(target_id("t1"), OutputFormat::Credentials)
		.with_duration(SessionDuration::from_secs(900).expect("900 seconds should be valid."));
	let file = file_of(
		harness.broker.become_target(&alice(), &request).await.expect("Become should succeed."),
	);

	assert_eq!(
		file,
		"[default]\naws_access_key_id = ASIATESTACCESSKEY\naws_secret_access_key = test-secret-key\naws_session_token = test-session-token\naws_security_token = test-session-token\n"
	);

	let assumed = harness.tokens.assumed.lock().clone();

	assert_eq!(assumed.len(), 1);
	assert_eq!(assumed[0].role_arn, ROLE_ARN);
	assert_eq!(assumed[0].session_name, "alice");
	assert_eq!(assumed[0].external_id.as_deref(), Some("ext-42"));
	assert_eq!(assumed[0].duration.map(SessionDuration::as_secs), Some(900));
	assert!(harness.tokens.federated.lock().is_empty());
}

#[tokio::test]
async fn user_targets_use_decrypted_federation_keys() {
	let harness = build_test_broker(test_config(false), 10);

	with_user(&harness, "AKIAUSER|user-secret").await;

	let request = BecomeRequest::new(target_id("u1"), OutputFormat::Credentials);

	harness.broker.become_target(&alice(), &request).await.expect("Become should succeed.");

	let federated = harness.tokens.federated.lock().clone();

	assert_eq!(federated.len(), 1);

	let (keys, token_request) = &federated[0];

	assert_eq!(keys.access_key_id, "AKIAUSER");
	assert_eq!(keys.secret_access_key.expose(), "user-secret");
	assert_eq!(token_request.name, "Prod-Admin");
	assert_eq!(token_request.policy, DEFAULT_FEDERATION_POLICY);
	assert_eq!(token_request.duration, None);
	assert!(harness.tokens.assumed.lock().is_empty());
}

#[tokio::test]
async fn console_output_is_a_signin_redirect() {
	let harness = build_test_broker(test_config(false), 10);

	with_role(&harness).await;

	let request = BecomeRequest::new(target_id("t1"), OutputFormat::Console);
	let url = match harness.broker.become_target(&alice(), &request).await {
		Ok(BrokerOutput::Redirect(url)) => url,
		other => panic!("Expected a redirect, got {other:?}."),
	};
	let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

	assert_eq!(url.host_str(), Some("signin.aws.amazon.com"));
	assert_eq!(url.path(), "/federation");
	assert_eq!(pairs.get("Action"), Some(&"login".into()));
	assert_eq!(pairs.get("Issuer"), Some(&"https://portal.example.com/".into()));
	assert_eq!(pairs.get("Destination"), Some(&DEFAULT_CONSOLE_DESTINATION.into()));
	assert_eq!(pairs.get("SigninToken"), Some(&"signin-token".into()));

	let sessions = harness.signin.sessions.lock().clone();

	assert_eq!(sessions.len(), 1);
	assert_eq!(sessions[0].session_id, "ASIATESTACCESSKEY");
	assert_eq!(sessions[0].session_token, "test-session-token");
}

#[tokio::test]
async fn unauthorized_requests_never_reach_sts() {
	let harness = build_test_broker(test_config(false), 10);

	with_role(&harness).await;

	let outsider = Identity::new(username("mallory"), ["g2"]);
	let request = BecomeRequest::new(target_id("t1"), OutputFormat::Credentials);
	let err =
		harness.broker.become_target(&outsider, &request).await.expect_err("Outsiders are denied.");

	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	assert!(harness.tokens.assumed.lock().is_empty());

	harness
		.store
		.put_association(&Association::new(username("mallory"), target_id("t1")))
		.await
		.expect("Grant should be created.");
	harness.broker.become_target(&outsider, &request).await.expect("Direct grants should work.");

	let granted = harness.broker.granted_targets(&outsider).await.expect("Grants should list.");

	assert_eq!(granted.len(), 1);
	assert_eq!(granted[0].target_name, "s3");
	assert!(harness.broker.allowed_targets(&outsider).await.expect("Targets should list.").is_empty());
}

#[tokio::test]
async fn high_security_requires_a_second_factor() {
	let harness = build_test_broker(test_config(true), 10);

	with_role(&harness).await;

	let request = BecomeRequest::new(target_id("t1"), OutputFormat::Credentials)
		.with_second_factor("push");

	harness.broker.become_target(&alice(), &request).await.expect("Allowed factor should pass.");

	assert_eq!(harness.step_up.auth_requests.lock().len(), 1);

	*harness.step_up.preauth.lock() = Ok(preauth_result("deny"));

	let err = harness.broker.become_target(&alice(), &request).await.expect_err("Denials abort.");

	assert_eq!(err.kind(), ErrorKind::StepUpDenied);
	assert_eq!(harness.tokens.assumed.lock().len(), 1);
}

#[tokio::test]
async fn high_security_without_a_gate_is_a_config_error() {
	let harness = build_test_broker(test_config(true), 10);

	with_role(&harness).await;

	let broker = Broker::new(
		test_config(true),
		harness.store.clone(),
		harness.cipher.clone(),
		harness.tokens.clone(),
		harness.signin.clone(),
	);
	let request = BecomeRequest::new(target_id("t1"), OutputFormat::Credentials);
	let err = broker.become_target(&alice(), &request).await.expect_err("A gate is mandatory.");

	assert!(matches!(err, Error::Config(ConfigError::MissingStepUpGate)));
	assert!(harness.tokens.assumed.lock().is_empty());
}

#[tokio::test]
async fn malformed_federation_secrets_abort() {
	let harness = build_test_broker(test_config(false), 10);

	with_user(&harness, "AKIAUSER-without-secret").await;

	let request = BecomeRequest::new(target_id("u1"), OutputFormat::Credentials);
	let err = harness.broker.become_target(&alice(), &request).await.expect_err("Bad secrets abort.");

	assert_eq!(err.kind(), ErrorKind::MalformedSecret);
	assert!(harness.tokens.federated.lock().is_empty());
}

#[tokio::test]
async fn upstream_failures_abort_without_output() {
	let harness = build_test_broker(test_config(false), 10);

	with_role(&harness).await;

	*harness.tokens.failure.lock() = Some("Throttling: Rate exceeded".into());

	let request = BecomeRequest::new(target_id("t1"), OutputFormat::Console);
	let err = harness.broker.become_target(&alice(), &request).await.expect_err("STS failures abort.");

	assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
	assert!(harness.signin.sessions.lock().is_empty());

	*harness.tokens.failure.lock() = None;
	*harness.signin.answer.lock() = Err("federation endpoint returned HTTP 500".into());

	let err =
		harness.broker.become_target(&alice(), &request).await.expect_err("Sign-in failures abort.");

	assert_eq!(err.kind(), ErrorKind::SigninExchangeFailed);

	*harness.signin.answer.lock() = Ok(String::new());

	let err =
		harness.broker.become_target(&alice(), &request).await.expect_err("Empty tokens abort.");

	assert_eq!(err.kind(), ErrorKind::SigninExchangeFailed);
}

#[tokio::test]
async fn failure_text_is_user_facing() {
	let harness = build_test_broker(test_config(false), 10);
	let request = BecomeRequest::new(target_id("nope"), OutputFormat::Credentials);
	let err = harness.broker.become_target(&alice(), &request).await.expect_err("Unknown targets fail.");

	assert_eq!(Broker::describe_failure(&err), "You are not allowed to access this target.");
}

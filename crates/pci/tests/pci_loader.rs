mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{FAILURE, Fixture, Render, add_flaky, add_invalid, add_load_failure, add_pci, sample};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use qti_data::{Closure, Error, Record, Value};
use qti_pci::response::BaseValue;
use qti_pci::{Config, LoadOptions, LoaderStatus, Response};

fn quick() -> LoadOptions {
	LoadOptions::with_timeout(Duration::from_millis(50))
}

#[tokio::test]
async fn loads_and_adopts_the_registered_name() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::Ready, Duration::ZERO);
	let pci = fixture.pci(sample("pci"), None);
	assert_eq!(pci.status(), LoaderStatus::Initial);

	let getter = pci.load(LoadOptions::default()).await.unwrap();
	assert_eq!(pci.status(), LoaderStatus::Loaded);
	assert_eq!(pci.name().as_deref(), Some("myPCI"));
	assert_eq!(getter.registry().type_identifiers(), vec!["myPCI"]);
	assert!(fixture.uncaught.lock().is_empty());
}

#[tokio::test]
async fn repeated_loads_share_one_attempt() {
	let fixture = Fixture::new();
	let evaluations = add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::Ready, Duration::ZERO);
	let pci = fixture.pci(sample("pci"), Some("myPCI"));

	let (first, second) = tokio::join!(pci.load(LoadOptions::default()), pci.load(LoadOptions::default()));
	let third = pci.load(LoadOptions::default()).await.unwrap();

	assert_eq!(first.unwrap(), third);
	assert_eq!(second.unwrap(), third);
	assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn name_mismatch_rejects() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::Ready, Duration::ZERO);
	let pci = fixture.pci(sample("pci"), Some("otherPCI"));

	let err = pci.load(LoadOptions::default()).await.unwrap_err();
	assert_eq!(
		err,
		Error::NameMismatch {
			expected: "otherPCI".into(),
			actual: "myPCI".into(),
		}
	);
	assert_eq!(err.to_string(), "Expected PCI 'otherPCI', got 'myPCI' instead");
	assert_eq!(pci.status(), LoaderStatus::Error);
}

#[tokio::test]
async fn runtime_failure_rejects_the_load() {
	let fixture = Fixture::new();
	add_load_failure(&fixture.engine, &sample("pci-load-failure"));
	let pci = fixture.pci(sample("pci-load-failure"), None);

	let err = pci.load(LoadOptions::default()).await.unwrap_err();
	assert_eq!(err.to_string(), FAILURE);
	assert_eq!(pci.status(), LoaderStatus::Error);
	assert_eq!(pci.name(), None);
}

#[tokio::test]
async fn invalid_descriptor_does_not_adopt_a_name() {
	let fixture = Fixture::new();
	add_invalid(&fixture.engine, &sample("pci-invalid"), "brokenPCI");
	let pci = fixture.pci(sample("pci-invalid"), None);

	let err = pci.load(LoadOptions::default()).await.unwrap_err();
	assert_eq!(err.to_string(), "Invalid interaction");
	assert_eq!(pci.status(), LoaderStatus::Error);
	assert_eq!(pci.name(), None);
}

#[tokio::test]
async fn failed_attempts_are_retried() {
	let fixture = Fixture::new();
	add_flaky(&fixture.engine, &sample("flaky"), "flaky");
	let pci = fixture.pci(sample("flaky"), None);

	assert!(pci.load(LoadOptions::default()).await.is_err());
	assert_eq!(pci.status(), LoaderStatus::Error);

	pci.load(LoadOptions::default()).await.unwrap();
	assert_eq!(pci.status(), LoaderStatus::Loaded);
	assert_eq!(pci.name().as_deref(), Some("flaky"));
}

#[tokio::test(start_paused = true)]
async fn load_timeout_leaves_the_attempt_running() {
	let fixture = Fixture::new();
	let evaluations = add_pci(&fixture.engine, &sample("slow"), "slowPCI", Render::Ready, Duration::from_millis(100));
	let pci = fixture.pci(sample("slow"), None);

	let err = pci.load(LoadOptions::with_timeout(Duration::from_millis(10))).await.unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(err.to_string(), "Loading PCI timed out");
	assert_eq!(pci.status(), LoaderStatus::Error);

	pci.load(LoadOptions::without_timeout()).await.unwrap();
	assert_eq!(pci.status(), LoaderStatus::Loaded);
	assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn renders_an_instance() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::Ready, Duration::ZERO);
	let pci = fixture.pci(sample("pci"), None);

	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	let bound = Record::from_iter([("RESPONSE", Response::single(BaseValue::String("Hello".into())).to_value())]);
	let config = Config::new(Record::from_iter([("level", 2)]))
		.with_bound_to(bound)
		.with_onready(Closure::new(move |args| {
			sink.lock().push(args.to_vec());
			Ok(None)
		}));

	let (interaction, state) = pci
		.get_instance(Value::from("container"), config, Value::from("saved"), LoadOptions::default())
		.await
		.unwrap();

	assert_eq!(state, Value::from("saved"));
	assert_eq!(interaction.get_state().unwrap(), Value::from("saved"));
	assert_eq!(
		interaction.get_response().unwrap(),
		Some(Response::single(BaseValue::String("Hello".into())))
	);
	interaction.oncompleted().unwrap();

	let seen = seen.lock();
	assert_eq!(seen.len(), 1);
	assert_eq!(seen[0], vec![Value::from(interaction.clone()), Value::from("saved")]);
}

#[tokio::test]
async fn render_failure_rejects() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci-render-failure"), "myPCI", Render::Fail, Duration::ZERO);
	let pci = fixture.pci(sample("pci-render-failure"), None);

	let err = pci
		.get_instance(Value::Nothing, Config::default(), Value::Nothing, LoadOptions::default())
		.await
		.unwrap_err();
	assert_eq!(err.to_string(), FAILURE);
	assert_eq!(pci.status(), LoaderStatus::Loaded);
}

#[tokio::test]
async fn forgotten_onready_rejects_instead_of_hanging() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::Forget, Duration::ZERO);
	let pci = fixture.pci(sample("pci"), None);

	let err = pci
		.get_instance(Value::Nothing, Config::default(), Value::Nothing, LoadOptions::without_timeout())
		.await
		.unwrap_err();
	assert!(err.to_string().contains("released onready"));
}

#[tokio::test(start_paused = true)]
async fn late_onready_still_resolves_within_budget() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::After(Duration::from_millis(20)), Duration::ZERO);
	let pci = fixture.pci(sample("pci"), None);

	let (_, state) = pci
		.get_instance(Value::Nothing, Config::default(), Value::from(7), quick())
		.await
		.unwrap();
	assert_eq!(state, Value::Int(7));
}

#[tokio::test(start_paused = true)]
async fn rendering_gets_what_loading_left_over() {
	let fixture = Fixture::new();
	add_pci(
		&fixture.engine,
		&sample("pci"),
		"myPCI",
		Render::After(Duration::from_millis(30)),
		Duration::from_millis(30),
	);
	let pci = fixture.pci(sample("pci"), None);

	let err = pci
		.get_instance(Value::Nothing, Config::default(), Value::Nothing, quick())
		.await
		.unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(err.to_string(), "Getting PCI instance timed out");
}

#[tokio::test(start_paused = true)]
async fn slow_loading_fails_get_instance_with_the_load_timeout() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("pci"), "myPCI", Render::Ready, Duration::from_millis(100));
	let pci = fixture.pci(sample("pci"), None);

	let err = pci
		.get_instance(Value::Nothing, Config::default(), Value::Nothing, quick())
		.await
		.unwrap_err();
	assert_eq!(err.to_string(), "Loading PCI timed out");
}

#[tokio::test]
async fn loaders_keep_separate_registries() {
	let fixture = Fixture::new();
	add_pci(&fixture.engine, &sample("first"), "firstPCI", Render::Ready, Duration::ZERO);
	add_pci(&fixture.engine, &sample("second"), "secondPCI", Render::Ready, Duration::ZERO);
	let first = fixture.pci(sample("first"), None);
	let second = fixture.pci(sample("second"), None);

	let (a, b) = tokio::join!(first.load(LoadOptions::default()), second.load(LoadOptions::default()));
	assert_eq!(a.unwrap().registry().type_identifiers(), vec!["firstPCI"]);
	assert_eq!(b.unwrap().registry().type_identifiers(), vec!["secondPCI"]);
	assert_eq!(first.name().as_deref(), Some("firstPCI"));
	assert_eq!(second.name().as_deref(), Some("secondPCI"));
}

use togglebox::EvaluationContext;

pub fn main() -> togglebox::Result<()> {
    // Configure env_logger to see ToggleBox SDK logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("togglebox")).init();

    let api_key = std::env::var("TOGGLEBOX_API_KEY")
        .expect("TOGGLEBOX_API_KEY env variable should contain API key");
    let client = togglebox::ClientConfig::from_api_key(api_key)
        .platform("web")
        .environment("production")
        .to_client()?;

    // Start a poller thread to fetch configuration from the server.
    let poller = client.start_poller_thread()?;

    // Block waiting for configuration. Until this call returns, the client has nothing cached
    // and every evaluation degrades to its default.
    if let Err(err) = poller.wait_for_configuration() {
        println!("error requesting configuration: {:?}", err);
    }

    let context = EvaluationContext::new("test-user").with_country("CA").with_language("fr");

    // Tier 2: boolean flag with a default.
    let enabled = client.is_flag_enabled("new-checkout", &context, false);
    println!("new-checkout enabled: {enabled}");

    // Tier 3: experiment variation, if the user is in the experiment.
    match client.get_variant("checkout-cta", &context) {
        Ok(Some(assignment)) => {
            println!("assigned variation: {} ({})", assignment.variation_key, assignment.reason);
            client.track_conversion("checkout-cta", &context, "purchases", Some(19.99));
        }
        Ok(None) => println!("user not in experiment"),
        Err(err) => println!("error assigning variation: {err:?}"),
    }

    Ok(())
}

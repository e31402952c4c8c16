// Architecture:
// - One wiremock server per test stands in for the TTS provider
// - The relay router is built exactly as in production and served on 127.0.0.1:0
// - Tests receive a fresh context through test-context lifecycle hooks
//
// Tests share nothing, so they run in parallel.

mod helpers;
mod test_health;
mod test_reader_flow;
mod test_relay;

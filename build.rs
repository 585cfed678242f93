fn main() {
    // Forward the ESP-IDF sysenv only for firmware builds; host builds
    // (tests) have no IDF toolchain environment to propagate.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}

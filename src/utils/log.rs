pub fn log_init() {
    use std::io::Write;
    // env_logger 通过环境变量 RUST_LOG 控制日志输出
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

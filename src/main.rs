use pbr_demo::{config::DemoConfig, flow};

fn main() -> anyhow::Result<()> {
    flow::run(DemoConfig::default())
}

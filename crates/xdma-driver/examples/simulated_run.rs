//! Full control sequence against the simulated accelerator
//!
//! Runs both register layouts end to end without hardware:
//! `cargo run -p xdma-driver --example simulated_run`

use std::time::Duration;
use xdma_driver::{
    AcceleratorController, ControllerConfig, RegisterLayout, Result, RoutingMask,
    SimulatedDevice,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("xdma_driver=debug")
        .init();

    // Combined layout: route stack 1 to the accelerator and run
    let device = SimulatedDevice::with_layout(RegisterLayout::Combined).with_latency(5);
    let mut ctrl = AcceleratorController::with_config(
        device.window(),
        RegisterLayout::Combined.register_map(),
        ControllerConfig::unthrottled(),
    )?;

    let routed = ctrl.configure_routing(RoutingMask::STACK1)?;
    println!("Routing      : {routed}");
    ctrl.trigger()?;
    let outcome = ctrl.wait_until_done(Duration::from_millis(1), Duration::from_secs(1))?;
    println!(
        "Combined run : {} after {} polls ({:?})",
        outcome.status, outcome.polls, outcome.elapsed
    );
    println!("Control word : {}", ctrl.control_word()?);
    ctrl.close();

    // Split layout: arm a transfer descriptor and read the result back
    let device = SimulatedDevice::with_layout(RegisterLayout::Split);
    let mut ctrl = AcceleratorController::with_config(
        device.window(),
        RegisterLayout::Split.register_map(),
        ControllerConfig::unthrottled(),
    )?;

    ctrl.arm_transfer(0x8000_0000, 4096)?;
    ctrl.trigger()?;
    let outcome = ctrl.wait()?;
    let result = ctrl.read_result()?;
    println!("Split run    : {} after {} polls", outcome.status, outcome.polls);
    if let Some(r) = result.result {
        println!("Result       : addr={:#010x} len={}", r.read_addr, r.read_len);
    }
    println!("Bus writes   : {:x?}", device.writes());

    Ok(())
}

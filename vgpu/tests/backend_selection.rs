mod common;

use vgpu::null::{self, NullConfig};
use vgpu::{
    create_device, AdapterInfo, AdapterType, AnyDevice, Backend, Device, DeviceDesc, Error, Features, PowerPreference,
};

fn adapter(name: &str, adapter_type: AdapterType, features: Features) -> AdapterInfo {
    AdapterInfo {
        name: name.into(),
        adapter_type,
        features,
        ..Default::default()
    }
}

fn config(adapters: Vec<AdapterInfo>) -> NullConfig {
    NullConfig {
        adapters,
        ..NullConfig::default()
    }
}

fn adapters() -> Vec<AdapterInfo> {
    vec![
        adapter("software", AdapterType::Cpu, Features::all()),
        adapter("integrated", AdapterType::IntegratedGpu, Features::TIMESTAMP_QUERY),
        adapter("discrete", AdapterType::DiscreteGpu, Features::TIMESTAMP_QUERY | Features::MESH_SHADER),
    ]
}

#[test]
fn unavailable_backend_falls_back_to_null() {
    common::init_logger();
    let device = create_device(&DeviceDesc {
        preferred_backend: Some(Backend::Vulkan),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(device.backend(), Backend::Null);
}

#[test]
fn power_preference_picks_the_adapter() {
    common::init_logger();
    let high = Device::<null::Api>::new(
        null::Instance::with_config(config(adapters())),
        &DeviceDesc {
            power_preference: PowerPreference::HighPerformance,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(high.adapter_info().name, "discrete");
    assert!(high.query_feature_support(Features::MESH_SHADER));

    let low = Device::<null::Api>::new(
        null::Instance::with_config(config(adapters())),
        &DeviceDesc {
            power_preference: PowerPreference::LowPower,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(low.adapter_info().name, "integrated");
    assert!(!low.query_feature_support(Features::MESH_SHADER));
}

#[test]
fn required_features_filter_adapters() {
    common::init_logger();
    let device = Device::<null::Api>::new(
        null::Instance::with_config(config(adapters())),
        &DeviceDesc {
            required_features: Features::RAY_TRACING,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(device.adapter_info().adapter_type, AdapterType::Cpu);

    let result = Device::<null::Api>::new(
        null::Instance::with_config(config(adapters()[1..].to_vec())),
        &DeviceDesc {
            required_features: Features::RAY_TRACING,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(Error::NoSuitableAdapter)));
}

#[test]
fn no_adapters_is_an_error() {
    common::init_logger();
    let result = Device::<null::Api>::new(null::Instance::with_config(config(Vec::new())), &DeviceDesc::default());
    assert!(matches!(result, Err(Error::NoSuitableAdapter)));
}

#[test]
fn device_reports_its_frequency_and_native_handle() {
    let device = common::device();
    assert_eq!(device.timestamp_frequency(), NullConfig::default().timestamp_frequency);
    assert!(device.native_object(vgpu::NativeObjectType::NullDevice).is_some());
    let AnyDevice::Null(any) = create_device(&DeviceDesc::default()).unwrap();
    assert_eq!(any.frame_count(), 0);
}

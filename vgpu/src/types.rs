//! Plain-data public types: enums, flags and creation descriptors.

/// GPU virtual address of a buffer.
pub type DeviceAddress = u64;

/// Unique identifier assigned to native objects by backends that track them.
pub type ResourceId = u64;

/// Hardware queue a command buffer is recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    #[default]
    Graphics,
    Compute,
    Copy,
}

impl QueueType {
    pub const COUNT: usize = 3;
    pub const ALL: [QueueType; Self::COUNT] = [QueueType::Graphics, QueueType::Compute, QueueType::Copy];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How the CPU may access a resource's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuAccessMode {
    /// Device-local; initial data goes through an upload context.
    #[default]
    None,
    /// Persistently mapped for CPU writes (upload heap).
    Write,
    /// Persistently mapped for CPU reads (readback heap).
    Read,
}

bitflags::bitflags! {
    /// Buffer usage flags; combine for buffers used in multiple ways (e.g. Vertex | Index | Indirect).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const SHADER_READ = 1 << 3;
        const SHADER_WRITE = 1 << 4;
        const INDIRECT = 1 << 5;
        const PREDICATION = 1 << 6;
        const RAY_TRACING = 1 << 7;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SHADER_READ = 1 << 0;
        const SHADER_WRITE = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const TRANSIENT = 1 << 3;
        const SHADING_RATE = 1 << 4;
        const SHARED = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Shader stage visibility. An empty set means every stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        const AMPLIFICATION = 1 << 6;
        const MESH = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Tracked GPU access state of a resource, used to derive transition barriers.
    /// The empty set is the common state resources are created in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const DEPTH_WRITE = 1 << 4;
        const DEPTH_READ = 1 << 5;
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        const PIXEL_SHADER_RESOURCE = 1 << 7;
        const INDIRECT_ARGUMENT = 1 << 8;
        const COPY_DEST = 1 << 9;
        const COPY_SOURCE = 1 << 10;
        const RESOLVE_DEST = 1 << 11;
        const RESOLVE_SOURCE = 1 << 12;
        const PRESENT = 1 << 13;
        const SHADING_RATE_SOURCE = 1 << 14;

        const SHADER_RESOURCE = Self::NON_PIXEL_SHADER_RESOURCE.bits() | Self::PIXEL_SHADER_RESOURCE.bits();
        const GENERIC_READ = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
        /// States a compute queue is allowed to transition into.
        const COMPUTE_LEGAL = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::UNORDERED_ACCESS.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_DEST.bits()
            | Self::COPY_SOURCE.bits();
    }
}

bitflags::bitflags! {
    /// Optional device capabilities, queried with `Device::query_feature_support`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u32 {
        const DEPTH32_FLOAT_STENCIL8 = 1 << 0;
        const TIMESTAMP_QUERY = 1 << 1;
        const PIPELINE_STATISTICS_QUERY = 1 << 2;
        const TEXTURE_COMPRESSION_BC = 1 << 3;
        const TEXTURE_COMPRESSION_ETC2 = 1 << 4;
        const TEXTURE_COMPRESSION_ASTC = 1 << 5;
        const TEXTURE_COMPRESSION_ASTC_HDR = 1 << 6;
        const INDIRECT_FIRST_INSTANCE = 1 << 7;
        const SHADER_FLOAT16 = 1 << 8;
        const CACHE_COHERENT_UMA = 1 << 9;
        const GEOMETRY_SHADER = 1 << 10;
        const TESSELLATION_SHADER = 1 << 11;
        const DEPTH_BOUNDS_TEST = 1 << 12;
        const SAMPLER_CLAMP_TO_BORDER = 1 << 13;
        const SAMPLER_MIRROR_CLAMP_TO_EDGE = 1 << 14;
        const SAMPLER_MIN_MAX = 1 << 15;
        const DEPTH_RESOLVE_MIN_MAX = 1 << 16;
        const STENCIL_RESOLVE_MIN_MAX = 1 << 17;
        const SHADER_OUTPUT_VIEWPORT_INDEX = 1 << 18;
        const CONSERVATIVE_RASTERIZATION = 1 << 19;
        const DESCRIPTOR_INDEXING = 1 << 20;
        const PREDICATION = 1 << 21;
        const VARIABLE_RATE_SHADING = 1 << 22;
        const VARIABLE_RATE_SHADING_TIER2 = 1 << 23;
        const RAY_TRACING = 1 << 24;
        const RAY_TRACING_TIER2 = 1 << 25;
        const MESH_SHADER = 1 << 26;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

/// Pixel formats understood by the runtime. Per-format tables (block sizes, native
/// equivalents) belong to the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Undefined,
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Unorm,
    R16Snorm,
    R16Uint,
    R16Sint,
    R16Float,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    Bgra4Unorm,
    B5g6r5Unorm,
    B5g5r5a1Unorm,
    R32Uint,
    R32Sint,
    R32Float,
    Rg16Unorm,
    Rg16Snorm,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    Rgba8Uint,
    Rgba8Sint,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb9e5Ufloat,
    Rgb10a2Unorm,
    Rgb10a2Uint,
    Rg11b10Float,
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba16Unorm,
    Rgba16Snorm,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    Stencil8,
    Depth16Unorm,
    Depth32Float,
    Depth24UnormStencil8,
    Depth32FloatStencil8,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2RgbaUnorm,
    Bc2RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    Bc4RUnorm,
    Bc4RSnorm,
    Bc5RgUnorm,
    Bc5RgSnorm,
    Bc6hRgbUfloat,
    Bc6hRgbSfloat,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth32Float
                | TextureFormat::Depth24UnormStencil8
                | TextureFormat::Depth32FloatStencil8
        )
    }

    pub fn is_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Stencil8 | TextureFormat::Depth24UnormStencil8 | TextureFormat::Depth32FloatStencil8
        )
    }

    /// True for any format that binds through a depth-stencil view.
    pub fn is_depth_stencil(self) -> bool {
        self.is_depth() || self.is_stencil()
    }
}

/// Number of mip levels for a full chain down to `min_dimension`.
pub fn mip_level_count(width: u32, height: u32, depth: u32, min_dimension: u32) -> u32 {
    let min_dimension = min_dimension.max(1);
    let mut levels = 1;
    let (mut w, mut h, mut d) = (width.max(1), height.max(1), depth.max(1));
    while w > min_dimension || h > min_dimension || d > min_dimension {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        d = (d / 2).max(1);
        levels += 1;
    }
    levels
}

/// Presentation mode of a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
}

impl PresentMode {
    /// Backbuffer count the swap object is created with.
    pub fn buffer_count(self) -> u32 {
        match self {
            PresentMode::Mailbox => 3,
            PresentMode::Immediate | PresentMode::Fifo => 2,
        }
    }

    pub fn sync_interval(self) -> u32 {
        match self {
            PresentMode::Immediate | PresentMode::Mailbox => 0,
            PresentMode::Fifo => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadAction {
    #[default]
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreAction {
    #[default]
    Store,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexType {
    Uint16,
    #[default]
    Uint32,
}

impl IndexType {
    pub fn size(self) -> u64 {
        match self {
            IndexType::Uint16 => 2,
            IndexType::Uint32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunction {
    #[default]
    Undefined,
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerFilter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerAddressMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerBorderColor {
    #[default]
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    #[default]
    Back,
    Front,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontFace {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthClipMode {
    #[default]
    Clip,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    PatchList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SourceColor,
    OneMinusSourceColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestinationColor,
    OneMinusDestinationColor,
    DestinationAlpha,
    OneMinusDestinationAlpha,
    SourceAlphaSaturated,
    BlendColor,
    OneMinusBlendColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    UByte2,
    UByte4,
    UByte4Normalized,
    Byte4Normalized,
    UShort2,
    UShort4,
    Short2Normalized,
    Short4Normalized,
    Half2,
    Half4,
    Float,
    Float2,
    Float3,
    Float4,
    UInt,
    UInt2,
    UInt3,
    UInt4,
    Int,
    Int2,
    Int3,
    Int4,
    UInt1010102Normalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexStepMode {
    #[default]
    Vertex,
    Instance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineType {
    #[default]
    Render,
    Compute,
    RayTracing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    /// Occlusion query heap or occlusion queries.
    #[default]
    Occlusion,
    /// Can share a heap with occlusion queries.
    BinaryOcclusion,
    Timestamp,
    PipelineStatistics,
}

/// Kind of resource a bind group layout slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    SampledTexture,
    StorageTexture,
    ReadOnlyStorageTexture,
    ConstantBuffer,
    DynamicConstantBuffer,
    StorageBuffer,
    ReadOnlyStorageBuffer,
}

/// Escape hatch identifiers for `Device::native_object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeObjectType {
    VkDevice,
    VkPhysicalDevice,
    VkInstance,
    D3D12Device,
    DxgiAdapter,
    DxgiFactory,
    /// Opaque id of a headless device.
    NullDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterType {
    DiscreteGpu,
    IntegratedGpu,
    Cpu,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Layout of one indirect dispatch record (x, y, z).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchIndirectCommand {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawIndirectCommand {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawIndexedIndirectCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub label: Option<&'static str>,
    pub size: u64,
    pub usage: BufferUsage,
    pub cpu_access: CpuAccessMode,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            label: None,
            size: 0,
            usage: BufferUsage::empty(),
            cpu_access: CpuAccessMode::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: Option<&'static str>,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub cpu_access: CpuAccessMode,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            label: None,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SHADER_READ,
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            cpu_access: CpuAccessMode::None,
        }
    }
}

impl TextureDesc {
    /// Number of subresources (mips times array layers; 3D textures count one layer).
    pub fn subresource_count(&self) -> u32 {
        let layers = match self.dimension {
            TextureDimension::D3 => 1,
            _ => self.depth_or_array_layers.max(1),
        };
        self.mip_level_count.max(1) * layers
    }
}

/// Initial contents of one texture subresource.
#[derive(Debug, Clone, Copy)]
pub struct TextureData<'a> {
    pub data: &'a [u8],
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub label: Option<&'static str>,
    pub min_filter: SamplerFilter,
    pub mag_filter: SamplerFilter,
    pub mip_filter: SamplerFilter,
    pub address_u: SamplerAddressMode,
    pub address_v: SamplerAddressMode,
    pub address_w: SamplerAddressMode,
    pub max_anisotropy: u32,
    pub mip_lod_bias: f32,
    pub compare_function: CompareFunction,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub border_color: SamplerBorderColor,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            label: None,
            min_filter: SamplerFilter::Nearest,
            mag_filter: SamplerFilter::Nearest,
            mip_filter: SamplerFilter::Nearest,
            address_u: SamplerAddressMode::Wrap,
            address_v: SamplerAddressMode::Wrap,
            address_w: SamplerAddressMode::Wrap,
            max_anisotropy: 1,
            mip_lod_bias: 0.0,
            compare_function: CompareFunction::Undefined,
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            border_color: SamplerBorderColor::TransparentBlack,
        }
    }
}

/// One slot shape in a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub count: u32,
    pub descriptor_type: DescriptorType,
    pub visibility: ShaderStages,
}

impl BindGroupLayoutEntry {
    pub fn new(binding: u32, descriptor_type: DescriptorType) -> Self {
        Self {
            binding,
            count: 1,
            descriptor_type,
            visibility: ShaderStages::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Register index to bind to (supplied in shader).
    pub shader_register: u32,
    /// Size in bytes; a multiple of 4.
    pub size: u32,
    pub visibility: ShaderStages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryHeapDesc {
    pub label: Option<&'static str>,
    pub query_type: QueryType,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct ShaderStageDesc {
    pub stage: ShaderStages,
    pub bytecode: Vec<u8>,
    pub entry_point: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u32,
    pub shader_location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargetBlendState {
    pub blend_enabled: bool,
    pub src_color_blend_factor: BlendFactor,
    pub dst_color_blend_factor: BlendFactor,
    pub color_blend_operation: BlendOperation,
    pub src_alpha_blend_factor: BlendFactor,
    pub dst_alpha_blend_factor: BlendFactor,
    pub alpha_blend_operation: BlendOperation,
    pub color_write_mask: ColorWriteMask,
}

impl Default for RenderTargetBlendState {
    fn default() -> Self {
        Self {
            blend_enabled: false,
            src_color_blend_factor: BlendFactor::One,
            dst_color_blend_factor: BlendFactor::Zero,
            color_blend_operation: BlendOperation::Add,
            src_alpha_blend_factor: BlendFactor::One,
            dst_alpha_blend_factor: BlendFactor::Zero,
            alpha_blend_operation: BlendOperation::Add,
            color_write_mask: ColorWriteMask::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendState {
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
    pub render_targets: [RenderTargetBlendState; crate::MAX_COLOR_ATTACHMENTS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub conservative_raster: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFaceState {
    pub compare_function: CompareFunction,
    pub fail_operation: StencilOperation,
    pub depth_fail_operation: StencilOperation,
    pub pass_operation: StencilOperation,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare_function: CompareFunction::Always,
            fail_operation: StencilOperation::Keep,
            depth_fail_operation: StencilOperation::Keep,
            pass_operation: StencilOperation::Keep,
        }
    }
}

impl StencilFaceState {
    fn is_passthrough(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthStencilState {
    pub depth_write_enabled: bool,
    pub depth_compare_function: CompareFunction,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub depth_bias: f32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
    pub depth_clip_mode: DepthClipMode,
    /// Only honored when `Features::DEPTH_BOUNDS_TEST` is supported.
    pub depth_bounds_test_enable: bool,
}

impl DepthStencilState {
    /// False when both faces always pass and keep every value.
    pub fn stencil_test_enabled(&self) -> bool {
        !(self.stencil_front.is_passthrough() && self.stencil_back.is_passthrough())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub label: Option<&'static str>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub present_mode: PresentMode,
    pub is_fullscreen: bool,
}

impl Default for SwapChainDesc {
    fn default() -> Self {
        Self {
            label: None,
            width: 0,
            height: 0,
            format: TextureFormat::Bgra8Unorm,
            present_mode: PresentMode::Fifo,
            is_fullscreen: false,
        }
    }
}

/// Device limits reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_texture_dimension_1d: u32,
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_dimension_cube: u32,
    pub max_texture_array_layers: u32,
    pub max_constant_buffer_binding_size: u64,
    pub max_storage_buffer_binding_size: u64,
    pub min_constant_buffer_offset_alignment: u32,
    pub min_storage_buffer_offset_alignment: u32,
    pub max_vertex_buffers: u32,
    pub max_vertex_attributes: u32,
    pub max_vertex_buffer_array_stride: u32,
    pub max_compute_workgroup_storage_size: u32,
    pub max_compute_invocations_per_workgroup: u32,
    pub max_compute_workgroup_size_x: u32,
    pub max_compute_workgroup_size_y: u32,
    pub max_compute_workgroup_size_z: u32,
    pub max_compute_workgroups_per_dimension: u32,
    pub max_viewports: u32,
    pub max_viewport_dimensions: [u32; 2],
    pub max_color_attachments: u32,
    pub ray_tracing_shader_group_identifier_size: u64,
    pub ray_tracing_shader_table_alignment: u64,
    pub ray_tracing_shader_table_max_stride: u64,
    pub ray_tracing_shader_recursion_max_depth: u32,
    pub ray_tracing_max_geometry_count: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_texture_dimension_1d: 16384,
            max_texture_dimension_2d: 16384,
            max_texture_dimension_3d: 2048,
            max_texture_dimension_cube: 16384,
            max_texture_array_layers: 2048,
            max_constant_buffer_binding_size: 65536,
            max_storage_buffer_binding_size: 1 << 31,
            min_constant_buffer_offset_alignment: crate::CONSTANT_BUFFER_ALIGNMENT as u32,
            min_storage_buffer_offset_alignment: 16,
            max_vertex_buffers: crate::MAX_VERTEX_BUFFERS as u32,
            max_vertex_attributes: crate::MAX_VERTEX_ATTRIBUTES as u32,
            max_vertex_buffer_array_stride: 2048,
            max_compute_workgroup_storage_size: 32768,
            max_compute_invocations_per_workgroup: 1024,
            max_compute_workgroup_size_x: 1024,
            max_compute_workgroup_size_y: 1024,
            max_compute_workgroup_size_z: 64,
            max_compute_workgroups_per_dimension: 65535,
            max_viewports: 16,
            max_viewport_dimensions: [16384, 16384],
            max_color_attachments: crate::MAX_COLOR_ATTACHMENTS as u32,
            ray_tracing_shader_group_identifier_size: 0,
            ray_tracing_shader_table_alignment: 0,
            ray_tracing_shader_table_max_stride: 0,
            ray_tracing_shader_recursion_max_depth: 0,
            ray_tracing_max_geometry_count: 0,
        }
    }
}

/// Description of one physical adapter, as enumerated by a backend instance.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterInfo {
    pub vendor_id: u32,
    pub device_id: u32,
    pub name: String,
    pub driver_description: String,
    pub adapter_type: AdapterType,
    pub features: Features,
    pub limits: Limits,
}

impl Default for AdapterInfo {
    fn default() -> Self {
        Self {
            vendor_id: 0,
            device_id: 0,
            name: String::new(),
            driver_description: String::new(),
            adapter_type: AdapterType::Unknown,
            features: Features::empty(),
            limits: Limits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_mode_buffer_counts() {
        assert_eq!(PresentMode::Mailbox.buffer_count(), 3);
        assert_eq!(PresentMode::Fifo.buffer_count(), 2);
        assert_eq!(PresentMode::Immediate.sync_interval(), 0);
        assert_eq!(PresentMode::Fifo.sync_interval(), 1);
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1, 1, 1), 1);
        assert_eq!(mip_level_count(256, 256, 1, 1), 9);
        assert_eq!(mip_level_count(256, 64, 1, 1), 9);
        assert_eq!(mip_level_count(256, 256, 1, 4), 7);
    }

    #[test]
    fn depth_stencil_classification() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.is_stencil());
        assert!(TextureFormat::Stencil8.is_depth_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn subresources_ignore_depth_of_volume_textures() {
        let desc = TextureDesc {
            dimension: TextureDimension::D3,
            depth_or_array_layers: 8,
            mip_level_count: 3,
            ..Default::default()
        };
        assert_eq!(desc.subresource_count(), 3);
    }
}

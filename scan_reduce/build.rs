fn main() {
    #[cfg(feature = "cuda")]
    cuda_builder::CudaBuilder::new("../scan_reduce_gpu")
        .copy_to("../resources/scan_reduce_gpu.ptx")
        .build()
        .unwrap();
}

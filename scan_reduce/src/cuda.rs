use crate::{
    device::{Accelerator, DeviceMemory, WorkSize},
    reduce::Strategy,
    scan::ScanPass,
    Error, Result,
};
use cust::prelude::*;

static PTX: &str = include_str!("../../resources/scan_reduce_gpu.ptx");

pub struct CudaBuffer {
    inner: DeviceBuffer<u32>,
}

impl CudaBuffer {
    fn check_len(&self, host: usize) -> Result<()> {
        if host != self.inner.len() {
            return Err(Error::LengthMismatch {
                host,
                device: self.inner.len(),
            });
        }
        Ok(())
    }
}

impl DeviceMemory for CudaBuffer {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn resize(&mut self, len: usize) -> Result<()> {
        if len != self.inner.len() {
            self.inner = DeviceBuffer::from_slice(&vec![0u32; len])?;
        }
        Ok(())
    }

    fn write(&mut self, src: &[u32]) -> Result<()> {
        self.check_len(src.len())?;
        self.inner.copy_from(src)?;
        Ok(())
    }

    fn read(&self, dst: &mut [u32]) -> Result<()> {
        self.check_len(dst.len())?;
        self.inner.copy_to(dst)?;
        Ok(())
    }
}

/// The first CUDA device, with the scan and sum kernels loaded.
pub struct CudaDevice {
    module: Module,
    stream: Stream,
    // Dropped last so the module and stream are released inside the context.
    _ctx: Context,
}

impl CudaDevice {
    pub fn new() -> Result<Self> {
        let _ctx = cust::quick_init()?;
        let module = Module::from_ptx(PTX, &[])?;
        let stream = Stream::new(StreamFlags::NON_BLOCKING, None)?;
        Ok(Self {
            module,
            stream,
            _ctx,
        })
    }

    fn grid(work: WorkSize) -> (u32, u32) {
        (work.group_count() as u32, work.group_size as u32)
    }
}

impl Accelerator for CudaDevice {
    type Buffer = CudaBuffer;

    fn name(&self) -> &str {
        "cuda"
    }

    fn alloc(&self, len: usize) -> Result<CudaBuffer> {
        Ok(CudaBuffer {
            inner: DeviceBuffer::from_slice(&vec![0u32; len])?,
        })
    }

    fn launch_scan_pass(
        &self,
        pass: ScanPass,
        work: WorkSize,
        xs: &mut CudaBuffer,
        block_size: usize,
    ) -> Result<()> {
        let stream = &self.stream;
        let kernel = self.module.get_function(pass.kernel_name())?;
        let (grid_size, block_size_x) = Self::grid(work);

        unsafe {
            launch!(
                kernel<<<grid_size, block_size_x, 0, stream>>>(
                    xs.inner.as_device_ptr(),
                    xs.inner.len(),
                    block_size
                )
            )?;
        }
        Ok(())
    }

    fn launch_reduction(
        &self,
        strategy: Strategy,
        work: WorkSize,
        xs: &CudaBuffer,
        result: &mut CudaBuffer,
    ) -> Result<()> {
        result.check_len(1)?;
        let stream = &self.stream;
        let kernel = self.module.get_function(strategy.kernel_name())?;
        let (grid_size, block_size) = Self::grid(work);

        unsafe {
            launch!(
                kernel<<<grid_size, block_size, 0, stream>>>(
                    xs.inner.as_device_ptr(),
                    xs.inner.len(),
                    result.inner.as_device_ptr()
                )
            )?;
        }
        Ok(())
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()?;
        Ok(())
    }
}

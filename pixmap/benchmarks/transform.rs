//! Benchmarks the geometric transforms of both buffer families.
use brunch::Bench;

use pixmap::{
    AnyImageBuffer, AntiAliasing, ImageBuffer, InitializationOptions, PixelFormat,
    PixelTransformable, Result, Size, YuvImageBuffer,
};

#[derive(Clone, Copy, Debug)]
enum Op {
    Scale(f32, Option<AntiAliasing>),
    Rotate(f32),
    Flip,
}

struct Transform {
    format: PixelFormat,
    op: Op,
    sz: u32,
}

impl Transform {
    fn name(&self) -> String {
        format!("transform({:?}, {:?}, {})", self.format, self.op, self.sz)
    }

    fn image(&self) -> Result<AnyImageBuffer> {
        let options = InitializationOptions::new(Size::new(self.sz, self.sz), self.format);
        Ok(if self.format.is_yuv() {
            YuvImageBuffer::new(&options)?.into()
        } else {
            ImageBuffer::new(&options)?.into()
        })
    }

    fn prepare(self) -> Result<impl FnMut()> {
        let source = self.image()?;
        let op = self.op;

        Ok(move || {
            let mut image = match &source {
                AnyImageBuffer::Rgb(image) => AnyImageBuffer::Rgb(image.try_clone().unwrap()),
                AnyImageBuffer::Yuv(image) => AnyImageBuffer::Yuv(image.try_clone().unwrap()),
            };

            match op {
                Op::Scale(factor, quality) => image.scale(factor, factor, quality),
                Op::Rotate(degrees) => image.rotate(degrees),
                Op::Flip => image.flip(true, false),
            }
            .unwrap()
        })
    }
}

fn main() {
    let ops = [
        Op::Scale(0.5, Some(AntiAliasing::None)),
        Op::Scale(0.5, Some(AntiAliasing::Medium)),
        Op::Scale(1.5, Some(AntiAliasing::High)),
        Op::Rotate(90.0),
        Op::Rotate(30.0),
        Op::Flip,
    ];

    let mut tests = Vec::new();
    for format in [PixelFormat::Rgba8888, PixelFormat::Rgb565] {
        tests.extend(ops.map(|op| Transform { format, op, sz: 512 }));
    }

    for format in [PixelFormat::Nv12, PixelFormat::YcbcrP010] {
        tests.extend(
            ops.into_iter()
                .filter(|op| !matches!(op, Op::Rotate(degrees) if degrees % 90.0 != 0.0))
                .map(|op| Transform { format, op, sz: 512 }),
        );
    }

    let mut benches = brunch::Benches::default();
    benches.extend(tests.into_iter().map(|transform| {
        Bench::new(format!("pixmap::transform::main::{}", transform.name()))
            .run(transform.prepare().expect("Failed to setup benchmark"))
    }));
    benches.finish();
}

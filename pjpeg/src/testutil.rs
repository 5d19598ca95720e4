//! Minimal baseline JPEG writer for decoder tests
//!
//! Produces DC-only images: every block is flat. Quantizers are all 1, the
//! DC table codes category `s` as the 4-bit value `s`, and the AC table has a
//! single 1-bit EOB code.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Gray,
    H1V1,
    H2V1,
    H1V2,
    H2V2,
}

impl Sampling {
    fn comps(self) -> usize {
        if self == Sampling::Gray {
            1
        } else {
            3
        }
    }

    fn luma_factors(self) -> (usize, usize) {
        match self {
            Sampling::Gray | Sampling::H1V1 => (1, 1),
            Sampling::H2V1 => (2, 1),
            Sampling::H1V2 => (1, 2),
            Sampling::H2V2 => (2, 2),
        }
    }

    fn luma_blocks(self) -> usize {
        let (h, v) = self.luma_factors();
        h * v
    }

    fn blocks_per_mcu(self) -> usize {
        self.luma_blocks() + self.comps() - 1
    }

    fn component(self, block: usize) -> usize {
        block.saturating_sub(self.luma_blocks() - 1)
    }
}

struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    n: u32,
}

impl BitWriter {
    fn put(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.n += 1;
            if self.n == 8 {
                let byte = self.acc as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0);
                }
                self.acc = 0;
                self.n = 0;
            }
        }
    }

    fn flush(&mut self) {
        while self.n != 0 {
            self.put(1, 1);
        }
    }
}

/// DC value of block `block` in MCU `mcu`
pub type DcFn = Box<dyn Fn(usize, usize) -> i16>;

pub struct JpegWriter {
    width: u16,
    height: u16,
    sampling: Sampling,
    dc: DcFn,
    restart_interval: u16,
    corrupt_restart: Option<usize>,
    frame_marker: u8,
    luma_sampling: Option<u8>,
    spectral_end: u8,
    ac_symbols: Vec<u8>,
    entropy: Option<Vec<u8>>,
}

impl JpegWriter {
    pub fn new(width: u16, height: u16, sampling: Sampling) -> Self {
        Self {
            width,
            height,
            sampling,
            dc: Box::new(|_, _| 0),
            restart_interval: 0,
            corrupt_restart: None,
            frame_marker: 0xC0,
            luma_sampling: None,
            spectral_end: 63,
            ac_symbols: vec![0x00],
            entropy: None,
        }
    }

    /// DC per block position inside each MCU, cycled if shorter
    pub fn fill(mut self, values: &[i16]) -> Self {
        let values = values.to_vec();
        self.dc = Box::new(move |_, block| values[block % values.len()]);
        self
    }

    pub fn mcu_dc(mut self, f: impl Fn(usize, usize) -> i16 + 'static) -> Self {
        self.dc = Box::new(f);
        self
    }

    pub fn restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Write the n-th restart marker with the wrong number
    pub fn corrupt_restart(mut self, n: usize) -> Self {
        self.corrupt_restart = Some(n);
        self
    }

    pub fn frame_marker(mut self, marker: u8) -> Self {
        self.frame_marker = marker;
        self
    }

    /// Raw H/V byte for the first component in the SOF
    pub fn luma_sampling(mut self, hv: u8) -> Self {
        self.luma_sampling = Some(hv);
        self
    }

    pub fn spectral_end(mut self, se: u8) -> Self {
        self.spectral_end = se;
        self
    }

    /// AC table whose i-th symbol has the 4-bit code `i`, replacing the
    /// default single 1-bit EOB
    pub fn ac_symbols(mut self, symbols: &[u8]) -> Self {
        self.ac_symbols = symbols.to_vec();
        self
    }

    /// Use these bytes as the entropy-coded segment, followed by EOI
    pub fn entropy(mut self, data: &[u8]) -> Self {
        self.entropy = Some(data.to_vec());
        self
    }

    fn segment(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
        out.extend_from_slice(&[0xFF, marker]);
        out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(body);
    }

    fn encode_dc(w: &mut BitWriter, diff: i32) {
        let mag = diff.unsigned_abs();
        let s = 32 - mag.leading_zeros();
        w.put(s, 4);
        if s > 0 {
            let bits = if diff > 0 { diff as u32 } else { (diff + (1 << s) - 1) as u32 };
            w.put(bits, s);
        }
        // EOB
        w.put(0, 1);
    }

    pub fn build(self) -> Vec<u8> {
        let comps = self.sampling.comps();
        let (hf, vf) = self.sampling.luma_factors();
        let mut out = vec![0xFF, 0xD8];

        let mut dqt = vec![0u8];
        dqt.extend_from_slice(&[1u8; 64]);
        Self::segment(&mut out, 0xDB, &dqt);

        let mut sof = vec![8];
        sof.extend_from_slice(&self.height.to_be_bytes());
        sof.extend_from_slice(&self.width.to_be_bytes());
        sof.push(comps as u8);
        for c in 0..comps {
            let samp = match c {
                0 => self.luma_sampling.unwrap_or(((hf << 4) | vf) as u8),
                _ => 0x11,
            };
            sof.extend_from_slice(&[c as u8 + 1, samp, 0]);
        }
        Self::segment(&mut out, self.frame_marker, &sof);

        let mut dht_dc = vec![0x00];
        let mut counts = [0u8; 16];
        counts[3] = 12;
        dht_dc.extend_from_slice(&counts);
        dht_dc.extend(0u8..12);
        Self::segment(&mut out, 0xC4, &dht_dc);

        let mut dht_ac = vec![0x10];
        let mut counts = [0u8; 16];
        if self.ac_symbols == [0x00] {
            counts[0] = 1;
        } else {
            counts[3] = self.ac_symbols.len() as u8;
        }
        dht_ac.extend_from_slice(&counts);
        dht_ac.extend_from_slice(&self.ac_symbols);
        Self::segment(&mut out, 0xC4, &dht_ac);

        if self.restart_interval != 0 {
            Self::segment(&mut out, 0xDD, &self.restart_interval.to_be_bytes());
        }

        let mut sos = vec![comps as u8];
        for c in 0..comps {
            sos.extend_from_slice(&[c as u8 + 1, 0x00]);
        }
        sos.extend_from_slice(&[0, self.spectral_end, 0]);
        Self::segment(&mut out, 0xDA, &sos);

        if let Some(data) = &self.entropy {
            out.extend_from_slice(data);
            out.extend_from_slice(&[0xFF, 0xD9]);
            return out;
        }

        let mcus_x = (self.width as usize).div_ceil(8 * hf);
        let mcus_y = (self.height as usize).div_ceil(8 * vf);
        let mut w = BitWriter {
            out: Vec::new(),
            acc: 0,
            n: 0,
        };
        let mut pred = [0i32; 3];
        let mut rst = 0usize;
        let interval = self.restart_interval as usize;

        for m in 0..mcus_x * mcus_y {
            if interval != 0 && m != 0 && m % interval == 0 {
                w.flush();
                let num = if self.corrupt_restart == Some(rst) { (rst + 3) & 7 } else { rst & 7 };
                w.out.extend_from_slice(&[0xFF, 0xD0 + num as u8]);
                rst += 1;
                pred = [0; 3];
            }
            for block in 0..self.sampling.blocks_per_mcu() {
                let comp = self.sampling.component(block);
                let dc = (self.dc)(m, block) as i32;
                Self::encode_dc(&mut w, dc - pred[comp]);
                pred[comp] = dc;
            }
        }
        w.flush();

        out.extend_from_slice(&w.out);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }
}

/// DC value that decodes to a flat block of `p`
pub fn dc_for(p: u8) -> i16 {
    (p as i16 - 128) * 8
}

/// Route `log` output to the test harness so failures show the marker trace
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

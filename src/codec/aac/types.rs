use crate::av::ChannelLayout;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Samples carried by one raw AAC frame.
pub const AAC_FRAME_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    LTP = 3,
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            1 => ProfileType::LC,
            2 => ProfileType::SSR,
            _ => ProfileType::LTP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AACConfig {
    pub profile: ProfileType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
}

impl AACConfig {
    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sample_rate_index as usize).copied()
    }

    pub fn channels(&self) -> u16 {
        match self.channel_configuration {
            7 => 8,
            c => c as u16,
        }
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        const FL: u64 = ChannelLayout::FRONT_LEFT;
        const FR: u64 = ChannelLayout::FRONT_RIGHT;
        const FC: u64 = ChannelLayout::FRONT_CENTER;
        const LFE: u64 = ChannelLayout::LOW_FREQUENCY;
        const BL: u64 = ChannelLayout::BACK_LEFT;
        const BR: u64 = ChannelLayout::BACK_RIGHT;
        const BC: u64 = ChannelLayout::BACK_CENTER;
        const SL: u64 = ChannelLayout::SIDE_LEFT;
        const SR: u64 = ChannelLayout::SIDE_RIGHT;

        ChannelLayout(match self.channel_configuration {
            1 => FC,
            2 => FL | FR,
            3 => FL | FR | FC,
            4 => FL | FR | FC | BC,
            5 => FL | FR | FC | BL | BR,
            6 => FL | FR | FC | BL | BR | LFE,
            7 => FL | FR | FC | BL | BR | SL | SR | LFE,
            _ => 0,
        })
    }

    /// The two byte MPEG-4 AudioSpecificConfig describing this stream.
    pub fn audio_specific_config(&self) -> [u8; 2] {
        let object_type = self.profile as u8 + 1;
        [
            (object_type << 3) | (self.sample_rate_index >> 1),
            ((self.sample_rate_index & 0x01) << 7) | (self.channel_configuration << 3),
        ]
    }
}

/// Fixed and variable parts of an ADTS frame header.
#[derive(Debug)]
pub struct ADTSHeader {
    pub id: u8,
    pub protection_absent: bool,
    pub profile: ProfileType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
    /// Frame length including the header
    pub frame_length: u16,
    pub number_of_raw_blocks: u8,
}

impl ADTSHeader {
    pub fn header_length(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }

    pub fn config(&self) -> AACConfig {
        AACConfig {
            profile: self.profile,
            sample_rate_index: self.sample_rate_index,
            channel_configuration: self.channel_configuration,
        }
    }
}

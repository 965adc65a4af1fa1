/// Control-list opcodes understood by the decoder.
///
/// Unknown byte values have no variant on purpose: [`ControlOp::from_u8`]
/// returns `None` and the walker reports them, so there is no table to index
/// out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlOp {
    Halt = 0,
    Nop = 1,
    Flush = 4,
    FlushAll = 5,
    StartTileBinning = 6,
    IncrementSemaphore = 7,
    WaitOnSemaphore = 8,
    Branch = 16,
    BranchToSubList = 17,
    ReturnFromSubList = 18,
    StoreMsTileBuffer = 24,
    StoreMsTileBufferAndEof = 25,
    StoreFullResTileBuffer = 26,
    LoadFullResTileBuffer = 27,
    StoreTileBufferGeneral = 28,
    LoadTileBufferGeneral = 29,
    GlIndexedPrimitive = 32,
    GlArrayPrimitive = 33,
    CompressedPrimitive = 48,
    ClippedCompressedPrimitive = 49,
    PrimitiveListFormat = 56,
    GlShaderState = 64,
    NvShaderState = 65,
    VgShaderState = 66,
    ConfigurationBits = 96,
    FlatShadeFlags = 97,
    PointSize = 98,
    LineWidth = 99,
    RhtXBoundary = 100,
    DepthOffset = 101,
    ClipWindow = 102,
    ViewportOffset = 103,
    ZClipping = 104,
    ClipperXyScaling = 105,
    ClipperZScaling = 106,
    TileBinningModeConfig = 112,
    TileRenderingModeConfig = 113,
    ClearColors = 114,
    TileCoordinates = 120,
}

impl ControlOp {
    pub fn from_u8(v: u8) -> Option<ControlOp> {
        use ControlOp::*;
        Some(match v {
            0 => Halt,
            1 => Nop,
            4 => Flush,
            5 => FlushAll,
            6 => StartTileBinning,
            7 => IncrementSemaphore,
            8 => WaitOnSemaphore,
            16 => Branch,
            17 => BranchToSubList,
            18 => ReturnFromSubList,
            24 => StoreMsTileBuffer,
            25 => StoreMsTileBufferAndEof,
            26 => StoreFullResTileBuffer,
            27 => LoadFullResTileBuffer,
            28 => StoreTileBufferGeneral,
            29 => LoadTileBufferGeneral,
            32 => GlIndexedPrimitive,
            33 => GlArrayPrimitive,
            48 => CompressedPrimitive,
            49 => ClippedCompressedPrimitive,
            56 => PrimitiveListFormat,
            64 => GlShaderState,
            65 => NvShaderState,
            66 => VgShaderState,
            96 => ConfigurationBits,
            97 => FlatShadeFlags,
            98 => PointSize,
            99 => LineWidth,
            100 => RhtXBoundary,
            101 => DepthOffset,
            102 => ClipWindow,
            103 => ViewportOffset,
            104 => ZClipping,
            105 => ClipperXyScaling,
            106 => ClipperZScaling,
            112 => TileBinningModeConfig,
            113 => TileRenderingModeConfig,
            114 => ClearColors,
            120 => TileCoordinates,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use ControlOp::*;
        match self {
            Halt => "HALT",
            Nop => "NOP",
            Flush => "FLUSH",
            FlushAll => "FLUSH_ALL",
            StartTileBinning => "START_TILE_BINNING",
            IncrementSemaphore => "INCREMENT_SEMAPHORE",
            WaitOnSemaphore => "WAIT_ON_SEMAPHORE",
            Branch => "BRANCH",
            BranchToSubList => "BRANCH_TO_SUB_LIST",
            ReturnFromSubList => "RETURN_FROM_SUB_LIST",
            StoreMsTileBuffer => "STORE_MS_TILE_BUFFER",
            StoreMsTileBufferAndEof => "STORE_MS_TILE_BUFFER_AND_EOF",
            StoreFullResTileBuffer => "STORE_FULL_RES_TILE_BUFFER",
            LoadFullResTileBuffer => "LOAD_FULL_RES_TILE_BUFFER",
            StoreTileBufferGeneral => "STORE_TILE_BUFFER_GENERAL",
            LoadTileBufferGeneral => "LOAD_TILE_BUFFER_GENERAL",
            GlIndexedPrimitive => "GL_INDEXED_PRIMITIVE",
            GlArrayPrimitive => "GL_ARRAY_PRIMITIVE",
            CompressedPrimitive => "COMPRESSED_PRIMITIVE",
            ClippedCompressedPrimitive => "CLIPPED_COMPRESSED_PRIMITIVE",
            PrimitiveListFormat => "PRIMITIVE_LIST_FORMAT",
            GlShaderState => "GL_SHADER_STATE",
            NvShaderState => "NV_SHADER_STATE",
            VgShaderState => "VG_SHADER_STATE",
            ConfigurationBits => "CONFIGURATION_BITS",
            FlatShadeFlags => "FLAT_SHADE_FLAGS",
            PointSize => "POINT_SIZE",
            LineWidth => "LINE_WIDTH",
            RhtXBoundary => "RHT_X_BOUNDARY",
            DepthOffset => "DEPTH_OFFSET",
            ClipWindow => "CLIP_WINDOW",
            ViewportOffset => "VIEWPORT_OFFSET",
            ZClipping => "Z_CLIPPING",
            ClipperXyScaling => "CLIPPER_XY_SCALING",
            ClipperZScaling => "CLIPPER_Z_SCALING",
            TileBinningModeConfig => "TILE_BINNING_MODE_CONFIG",
            TileRenderingModeConfig => "TILE_RENDERING_MODE_CONFIG",
            ClearColors => "CLEAR_COLORS",
            TileCoordinates => "TILE_COORDINATES",
        }
    }

    /// Total packet size in bytes, opcode byte included. `None` for the two
    /// compressed-primitive opcodes, whose length comes from the
    /// sub-grammar.
    pub fn fixed_size(self) -> Option<u8> {
        use ControlOp::*;
        Some(match self {
            Halt | Nop | Flush | FlushAll | StartTileBinning | IncrementSemaphore
            | WaitOnSemaphore | ReturnFromSubList | StoreMsTileBuffer
            | StoreMsTileBufferAndEof => 1,
            Branch | BranchToSubList | StoreFullResTileBuffer | LoadFullResTileBuffer
            | GlShaderState | NvShaderState | VgShaderState | FlatShadeFlags | PointSize
            | LineWidth | DepthOffset | ViewportOffset => 5,
            StoreTileBufferGeneral | LoadTileBufferGeneral => 7,
            GlIndexedPrimitive => 14,
            GlArrayPrimitive => 10,
            CompressedPrimitive | ClippedCompressedPrimitive => return None,
            PrimitiveListFormat => 2,
            ConfigurationBits => 4,
            RhtXBoundary | TileCoordinates => 3,
            ClipWindow | ZClipping | ClipperXyScaling | ClipperZScaling => 9,
            TileBinningModeConfig => 16,
            TileRenderingModeConfig => 11,
            ClearColors => 14,
        })
    }

    /// Opcodes after which the hardware stops consuming this list: control
    /// either halts or has transferred elsewhere, so decoding of the current
    /// range ends with them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ControlOp::Halt
                | ControlOp::StoreMsTileBufferAndEof
                | ControlOp::ReturnFromSubList
                | ControlOp::Branch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_round_trips_known_opcodes() {
        for v in 0..=255u8 {
            if let Some(op) = ControlOp::from_u8(v) {
                assert_eq!(op as u8, v);
            }
        }
    }

    #[test]
    fn unknown_bytes_have_no_entry() {
        for v in [2u8, 3, 9, 15, 19, 50, 67, 121, 200, 255] {
            assert_eq!(ControlOp::from_u8(v), None);
        }
    }

    #[test]
    fn sizes_match_the_packet_table() {
        assert_eq!(ControlOp::Halt.fixed_size(), Some(1));
        assert_eq!(ControlOp::Branch.fixed_size(), Some(5));
        assert_eq!(ControlOp::StoreTileBufferGeneral.fixed_size(), Some(7));
        assert_eq!(ControlOp::GlIndexedPrimitive.fixed_size(), Some(14));
        assert_eq!(ControlOp::GlArrayPrimitive.fixed_size(), Some(10));
        assert_eq!(ControlOp::PrimitiveListFormat.fixed_size(), Some(2));
        assert_eq!(ControlOp::TileBinningModeConfig.fixed_size(), Some(16));
        assert_eq!(ControlOp::TileRenderingModeConfig.fixed_size(), Some(11));
        assert_eq!(ControlOp::CompressedPrimitive.fixed_size(), None);
        assert_eq!(ControlOp::ClippedCompressedPrimitive.fixed_size(), None);
    }

    #[test]
    fn terminal_set_is_exact() {
        let terminal: Vec<u8> = (0..=255u8)
            .filter(|&v| ControlOp::from_u8(v).is_some_and(|op| op.is_terminal()))
            .collect();
        assert_eq!(terminal, vec![0, 16, 18, 25]);
    }
}

// Licensed under the Apache-2.0 license

//! Register field layouts shared by the ROM drivers and the emulated peripherals.

use tock_registers::register_bitfields;

register_bitfields![u32,
    /// AES engine control. Reads back with EXEC set while a command is running.
    pub AesCtrl [
        EXEC OFFSET(31) NUMBITS(1) [],
        IRQ OFFSET(30) NUMBITS(1) [],
        ERR OFFSET(29) NUMBITS(1) [],
        /// Run the data through the cipher; clear for a plain DMA copy.
        ENA OFFSET(28) NUMBITS(1) [],
        DEC OFFSET(27) NUMBITS(1) [],
        /// Continue from the chaining value of the previous command.
        IV OFFSET(12) NUMBITS(1) [],
        /// Block count minus one.
        BLOCKS OFFSET(0) NUMBITS(12) []
    ],
    /// OTP direct access command.
    pub OtpCmd [
        RD OFFSET(31) NUMBITS(1) [],
        BANK OFFSET(8) NUMBITS(3) [],
        WORD OFFSET(0) NUMBITS(5) []
    ]
];

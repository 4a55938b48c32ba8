//! Width tables of the parameterized value families
//!
//! The macros hand the width list to a callback macro as literal tokens:
//! `narrow_widths!(cb!(args))` expands to `cb!(args ; 1 2 ... 64)`. The wide
//! list steps by one up to 128 and by eight from 136 to 1024, so the edge
//! widths 1, 64, 128 and 1024 are all present.

macro_rules! narrow_widths {
    ($callback:ident ! ($($args:tt)*)) => {
        $callback!($($args)* ;
            1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28
            29 30 31 32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53
            54 55 56 57 58 59 60 61 62 63 64
        )
    };
}

macro_rules! wide_widths {
    ($callback:ident ! ($($args:tt)*)) => {
        $callback!($($args)* ;
            1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28
            29 30 31 32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53
            54 55 56 57 58 59 60 61 62 63 64 65 66 67 68 69 70 71 72 73 74 75 76 77 78
            79 80 81 82 83 84 85 86 87 88 89 90 91 92 93 94 95 96 97 98 99 100 101 102
            103 104 105 106 107 108 109 110 111 112 113 114 115 116 117 118 119 120 121
            122 123 124 125 126 127 128 136 144 152 160 168 176 184 192 200 208 216 224
            232 240 248 256 264 272 280 288 296 304 312 320 328 336 344 352 360 368 376
            384 392 400 408 416 424 432 440 448 456 464 472 480 488 496 504 512 520 528
            536 544 552 560 568 576 584 592 600 608 616 624 632 640 648 656 664 672 680
            688 696 704 712 720 728 736 744 752 760 768 776 784 792 800 808 816 824 832
            840 848 856 864 872 880 888 896 904 912 920 928 936 944 952 960 968 976 984
            992 1000 1008 1016 1024
        )
    };
}

pub(crate) use narrow_widths;
pub(crate) use wide_widths;
